//! The shared rendering surface.
//!
//! The real widget toolkit is out of scope; [`Surface`] records what an app
//! drew so tests and demos can observe it. The surface is touched by the
//! loader thread (show/hide) and by the GUI service (status bar), always
//! through the [`Display`] lock.
//!
//! The lock is reentrant: the loader holds it across a whole show/hide
//! transition, including the synchronous lifecycle event fan-out, and GUI
//! subscribers running inside that fan-out lock it again to redraw.

use core::cell::RefCell;

use rtsync::{RecursiveMutex, RecursiveMutexGuard, SyncResult, Ticks};

use crate::app::LaunchId;

/// What is currently drawn on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Surface {
    owner: Option<LaunchId>,
    title: Option<String>,
    labels: Vec<String>,
    statusbar_visible: bool,
    toolbar_visible: bool,
    statusbar_text: Option<String>,
    redraws: u32,
}

impl Surface {
    /// Wipes app content and hands the surface to `owner`.
    pub fn clear_for(&mut self, owner: Option<LaunchId>) {
        self.owner = owner;
        self.title = None;
        self.labels.clear();
        self.redraws += 1;
    }

    pub fn owner(&self) -> Option<LaunchId> {
        self.owner
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn add_label(&mut self, text: impl Into<String>) {
        self.labels.push(text.into());
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn set_bars(&mut self, statusbar: bool, toolbar: bool) {
        self.statusbar_visible = statusbar;
        self.toolbar_visible = toolbar;
    }

    pub fn statusbar_visible(&self) -> bool {
        self.statusbar_visible
    }

    pub fn toolbar_visible(&self) -> bool {
        self.toolbar_visible
    }

    pub fn set_statusbar_text(&mut self, text: impl Into<String>) {
        self.statusbar_text = Some(text.into());
    }

    pub fn statusbar_text(&self) -> Option<&str> {
        self.statusbar_text.as_deref()
    }

    /// Number of times the surface was handed to a new owner.
    pub fn redraws(&self) -> u32 {
        self.redraws
    }
}

/// Cross-thread handle to the surface.
#[derive(Debug, Default)]
pub struct Display {
    surface: RecursiveMutex<RefCell<Surface>>,
}

/// Held display lock. Borrow the surface through it with `borrow_mut()`.
pub type DisplayGuard<'a> = RecursiveMutexGuard<'a, RefCell<Surface>>;

impl Display {
    pub fn new() -> Self {
        Self {
            surface: RecursiveMutex::new(RefCell::new(Surface::default())),
        }
    }

    /// Locks the display, waiting at most `timeout`. Nested locking from the
    /// holding thread succeeds immediately.
    pub fn lock(&self, timeout: Ticks) -> SyncResult<DisplayGuard<'_>> {
        self.surface.acquire(timeout)
    }

    /// Runs `f` with the surface, waiting at most `timeout` for the lock.
    ///
    /// `f` must not lock the display again while it holds the borrow.
    pub fn with_surface<R>(&self, timeout: Ticks, f: impl FnOnce(&mut Surface) -> R) -> SyncResult<R> {
        let guard = self.lock(timeout)?;
        let mut surface = guard.borrow_mut();
        Ok(f(&mut surface))
    }

    /// Copy of the current surface.
    pub fn snapshot(&self, timeout: Ticks) -> SyncResult<Surface> {
        self.with_surface(timeout, |surface| surface.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_lock_on_same_thread() {
        let display = Display::new();
        let outer = display.lock(Ticks::ZERO).unwrap();
        outer.borrow_mut().set_title("outer");

        display
            .with_surface(Ticks::ZERO, |surface| surface.add_label("inner"))
            .unwrap();
        drop(outer);

        let surface = display.snapshot(Ticks::ZERO).unwrap();
        assert_eq!(surface.title(), Some("outer"));
        assert_eq!(surface.labels(), ["inner".to_string()]);
    }

    #[test]
    fn clear_for_resets_app_content_only() {
        let mut surface = Surface::default();
        surface.set_title("old");
        surface.add_label("x");
        surface.set_bars(true, false);
        surface.clear_for(Some(LaunchId(3)));

        assert_eq!(surface.owner(), Some(LaunchId(3)));
        assert!(surface.title().is_none());
        assert!(surface.labels().is_empty());
        assert!(surface.statusbar_visible());
        assert_eq!(surface.redraws(), 1);
    }
}
