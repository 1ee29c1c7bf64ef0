//! Per-app lifecycle transitions.
//!
//! Each transition runs the matching app callback, records the new state and,
//! for show and hide, publishes the event while the display is still locked so
//! GUI subscribers redraw against the state the app just produced.

use appkit::{AppFlags, AppState, Display};
use rtsync::{PubSub, Ticks};

use crate::event::LoaderEvent;
use crate::stack::StackEntry;

/// What a transition needs besides the entry itself.
pub(crate) struct Stage<'a> {
    pub(crate) display: &'a Display,
    pub(crate) pubsub: &'a PubSub<LoaderEvent>,
    pub(crate) display_timeout: Ticks,
}

impl Stage<'_> {
    /// Moves `entry` to `next`. Illegal transitions are fatal.
    #[track_caller]
    pub(crate) fn transition(&self, entry: &mut StackEntry, next: AppState) {
        let from = entry.state;
        rtsync::check!(
            from.can_transition_to(next),
            "app \"{}\" illegal transition {from} -> {next}",
            entry.id()
        );
        log::info!(target: "loader", "app \"{}\" state: {from} -> {next}", entry.id());

        match next {
            AppState::Initial => entry.state = next,
            AppState::Started => {
                entry.app.on_start(&mut entry.ctx);
                entry.state = next;
            }
            AppState::Showing => self.show(entry),
            AppState::Hiding => self.hide(entry),
            AppState::Stopped => {
                entry.app.on_stop(&mut entry.ctx);
                entry.state = next;
            }
        }
    }

    fn show(&self, entry: &mut StackEntry) {
        let event = LoaderEvent::Showing(entry.info());
        match self.display.lock(self.display_timeout) {
            Ok(guard) => {
                {
                    let mut surface = guard.borrow_mut();
                    let flags = entry.ctx.flags();
                    surface.clear_for(Some(entry.ctx.launch_id()));
                    surface.set_bars(
                        flags.contains(AppFlags::SHOW_STATUSBAR),
                        flags.contains(AppFlags::SHOW_TOOLBAR),
                    );
                    entry.app.on_show(&mut entry.ctx, &mut surface);
                }
                entry.state = AppState::Showing;
                self.pubsub.publish(&event);
            }
            Err(err) => {
                log::error!(
                    target: "loader",
                    "app \"{}\" shown without display: lock failed: {err}",
                    entry.id()
                );
                entry.state = AppState::Showing;
                self.pubsub.publish(&event);
            }
        }
    }

    fn hide(&self, entry: &mut StackEntry) {
        let event = LoaderEvent::Hiding(entry.info());
        match self.display.lock(self.display_timeout) {
            Ok(guard) => {
                entry.app.on_hide(&mut entry.ctx);
                guard.borrow_mut().clear_for(None);
                entry.state = AppState::Hiding;
                self.pubsub.publish(&event);
            }
            Err(err) => {
                log::error!(
                    target: "loader",
                    "app \"{}\" hidden without display: lock failed: {err}",
                    entry.id()
                );
                entry.app.on_hide(&mut entry.ctx);
                entry.state = AppState::Hiding;
                self.pubsub.publish(&event);
            }
        }
    }
}
