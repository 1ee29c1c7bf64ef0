//! Lifecycle events published by the loader.

use core::fmt;

use appkit::{AppState, AppType, LaunchId};

/// Identity of one launched app, as carried by events and snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub launch_id: LaunchId,
    pub id: String,
    pub name: String,
    pub app_type: AppType,
}

impl fmt::Display for AppInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" {}", self.id, self.launch_id)
    }
}

/// Published on the loader's pubsub, on the loader thread, with the display
/// locked for `Showing` and `Hiding`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderEvent {
    /// A start request completed; the app is now on top and showing.
    Started(AppInfo),
    Showing(AppInfo),
    Hiding(AppInfo),
    /// The app was stopped and removed from the stack.
    Stopped(AppInfo),
}

impl LoaderEvent {
    pub fn info(&self) -> &AppInfo {
        match self {
            LoaderEvent::Started(info)
            | LoaderEvent::Showing(info)
            | LoaderEvent::Hiding(info)
            | LoaderEvent::Stopped(info) => info,
        }
    }
}

/// Atomically published view of the top of the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSnapshot {
    pub info: AppInfo,
    pub state: AppState,
    /// Stack depth when the snapshot was taken.
    pub depth: usize,
}
