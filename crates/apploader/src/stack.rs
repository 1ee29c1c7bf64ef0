//! The application stack, owned by the loader thread.

use std::sync::Arc;

use appkit::{App, AppContext, AppState, Bundle, LaunchId, Manifest};

use crate::config::APP_STACK_SIZE;
use crate::event::{AppInfo, AppSnapshot};

/// One running app: its instance, its context and its lifecycle state.
pub(crate) struct StackEntry {
    pub(crate) app: Box<dyn App>,
    pub(crate) ctx: AppContext,
    pub(crate) state: AppState,
    /// The bottom entry; it can never be stopped by request.
    pub(crate) is_root: bool,
}

impl StackEntry {
    pub(crate) fn new(manifest: Arc<Manifest>, bundle: Bundle, launch_id: LaunchId, is_root: bool) -> Self {
        let app = manifest.instantiate();
        Self {
            app,
            ctx: AppContext::new(manifest, bundle, launch_id),
            state: AppState::Initial,
            is_root,
        }
    }

    pub(crate) fn id(&self) -> &str {
        self.ctx.manifest().id()
    }

    pub(crate) fn info(&self) -> AppInfo {
        let manifest = self.ctx.manifest();
        AppInfo {
            launch_id: self.ctx.launch_id(),
            id: manifest.id().to_owned(),
            name: manifest.name().to_owned(),
            app_type: manifest.app_type(),
        }
    }
}

/// Bottom-to-top list of running apps.
pub(crate) struct AppStack {
    entries: heapless::Vec<StackEntry, APP_STACK_SIZE>,
    limit: usize,
}

impl AppStack {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            entries: heapless::Vec::new(),
            limit: limit.min(APP_STACK_SIZE),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.entries.len() >= self.limit
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id() == id)
    }

    /// Pushes a new top entry, handing it back when the stack is full.
    pub(crate) fn push(&mut self, entry: StackEntry) -> Result<(), StackEntry> {
        if self.is_full() {
            return Err(entry);
        }
        self.entries.push(entry)
    }

    pub(crate) fn pop(&mut self) -> Option<StackEntry> {
        self.entries.pop()
    }

    pub(crate) fn top(&self) -> Option<&StackEntry> {
        self.entries.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut StackEntry> {
        self.entries.last_mut()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut StackEntry> {
        self.entries.get_mut(index)
    }

    pub(crate) fn snapshot(&self) -> Option<AppSnapshot> {
        self.top().map(|entry| AppSnapshot {
            info: entry.info(),
            state: entry.state,
            depth: self.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, launch: u32) -> StackEntry {
        let manifest = Arc::new(Manifest::builder(id).build());
        StackEntry::new(manifest, Bundle::new(), LaunchId(launch), launch == 1)
    }

    #[test]
    fn push_respects_limit() {
        let mut stack = AppStack::new(2);
        assert!(stack.push(entry("a", 1)).is_ok());
        assert!(stack.push(entry("b", 2)).is_ok());
        assert!(stack.is_full());

        let rejected = stack.push(entry("c", 3)).err().map(|e| e.info().id);
        assert_eq!(rejected.as_deref(), Some("c"));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn snapshot_describes_top() {
        let mut stack = AppStack::new(APP_STACK_SIZE);
        assert!(stack.snapshot().is_none());

        stack.push(entry("root", 1)).ok();
        stack.push(entry("child", 2)).ok();
        let snapshot = stack.snapshot().unwrap();
        assert_eq!(snapshot.info.id, "child");
        assert_eq!(snapshot.depth, 2);
        assert_eq!(snapshot.state, AppState::Initial);

        assert!(stack.contains("root"));
        assert!(stack.get_mut(0).unwrap().is_root);
        assert!(!stack.top().unwrap().is_root);
    }
}
