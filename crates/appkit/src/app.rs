//! Application instances and their lifecycle.

use core::fmt;
use std::sync::Arc;

use crate::bundle::Bundle;
use crate::display::Surface;
use crate::manifest::{AppFlags, Manifest};

/// Identifies one launch of an app. Unique for the lifetime of a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LaunchId(pub u32);

impl fmt::Display for LaunchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a running app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    Initial,
    Started,
    Showing,
    Hiding,
    Stopped,
}

impl AppState {
    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: AppState) -> bool {
        use AppState::*;
        matches!(
            (self, next),
            (Initial, Started)
                | (Started, Showing)
                | (Hiding, Showing)
                | (Showing, Hiding)
                | (Hiding, Stopped)
                | (Started, Stopped)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppState::Initial => "initial",
            AppState::Started => "started",
            AppState::Showing => "showing",
            AppState::Hiding => "hiding",
            AppState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-launch data handed to every lifecycle callback.
pub struct AppContext {
    manifest: Arc<Manifest>,
    parameters: Bundle,
    flags: AppFlags,
    launch_id: LaunchId,
}

impl AppContext {
    pub fn new(manifest: Arc<Manifest>, parameters: Bundle, launch_id: LaunchId) -> Self {
        let flags = manifest.flags();
        Self {
            manifest,
            parameters,
            flags,
            launch_id,
        }
    }

    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    /// Parameters the app was started with.
    pub fn parameters(&self) -> &Bundle {
        &self.parameters
    }

    pub fn flags(&self) -> AppFlags {
        self.flags
    }

    /// Changes how the bars are shown; takes effect on the next show.
    pub fn set_flags(&mut self, flags: AppFlags) {
        self.flags = flags;
    }

    pub fn launch_id(&self) -> LaunchId {
        self.launch_id
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("app", &self.manifest.id())
            .field("launch_id", &self.launch_id)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Lifecycle callbacks of an application.
///
/// The boxed value is the instance's private data: it is created by the
/// manifest factory when the app is started and dropped right after
/// `on_stop`. All callbacks run on the loader thread and block it while they
/// run.
pub trait App: Send {
    /// Called once after creation, before the app is visible.
    fn on_start(&mut self, _ctx: &mut AppContext) {}

    /// Called with the display locked whenever the app becomes visible.
    fn on_show(&mut self, _ctx: &mut AppContext, _surface: &mut Surface) {}

    /// Called when another app covers this one or before it stops.
    fn on_hide(&mut self, _ctx: &mut AppContext) {}

    /// Called once before the instance is dropped.
    fn on_stop(&mut self, _ctx: &mut AppContext) {}
}
