//! One-shot rendezvous between a caller and a worker thread.
//!
//! [`alloc_locked`] returns a pair: the caller keeps the [`ApiLock`] and sends
//! the [`ApiSignal`] along with its request. The worker signals exactly once
//! with the request's result; the caller blocks in
//! [`ApiLock::wait_and_free`] until then. Both halves are consumed by use, so
//! a lock can neither be reused nor signalled twice.
//!
//! A caller that does not want to wait simply sends no signal half at all
//! (`Option<ApiSignal<T>>::None`).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{SyncError, SyncResult};
use crate::event_flag::{EventFlags, WaitMode};
use crate::kernel::Ticks;

const DONE: u32 = 1 << 0;
const DROPPED: u32 = 1 << 1;

struct Slot<T> {
    flags: EventFlags,
    value: Mutex<Option<T>>,
}

/// Waiting half of the rendezvous.
#[must_use = "dropping the lock discards the result"]
pub struct ApiLock<T> {
    slot: Arc<Slot<T>>,
}

/// Signalling half of the rendezvous. Dropping it unsignalled wakes the
/// waiter with [`SyncError::Disconnected`].
pub struct ApiSignal<T> {
    slot: Option<Arc<Slot<T>>>,
}

/// Creates a fresh rendezvous with its done bit clear.
pub fn alloc_locked<T>() -> (ApiLock<T>, ApiSignal<T>) {
    let slot = Arc::new(Slot {
        flags: EventFlags::new(),
        value: Mutex::new(None),
    });
    (
        ApiLock { slot: slot.clone() },
        ApiSignal { slot: Some(slot) },
    )
}

impl<T> ApiLock<T> {
    /// Blocks until the worker signals, then returns its value.
    pub fn wait_and_free(self, timeout: Ticks) -> SyncResult<T> {
        self.slot
            .flags
            .wait(DONE | DROPPED, WaitMode::ANY, timeout)?;
        self.slot.value.lock().take().ok_or(SyncError::Disconnected)
    }
}

impl<T> ApiSignal<T> {
    /// Publishes `value` and wakes the waiter. Usable from interrupt context.
    pub fn signal(mut self, value: T) {
        if let Some(slot) = self.slot.take() {
            // The slot is written before the bit so the waiter always sees it.
            *slot.value.lock() = Some(value);
            slot.flags.set(DONE);
        }
    }
}

impl<T> Drop for ApiSignal<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.flags.set(DROPPED);
        }
    }
}
