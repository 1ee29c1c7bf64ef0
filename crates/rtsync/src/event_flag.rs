//! Event flag groups.
//!
//! An [`EventFlags`] holds up to [`MAX_BITS`] independent flags that can be
//! set and cleared atomically and awaited with "any" or "all" semantics. It
//! serves both as a rendezvous primitive and as a thread's private "wake
//! reason" signal.
//!
//! `set`, `clear` and `get` are callable from interrupt context; waking the
//! waiters is then deferred to the end of the handler. `wait` blocks and is
//! therefore forbidden there.

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::{Condvar, Mutex};

use crate::error::{SyncError, SyncResult};
use crate::kernel::{self, Ticks, Wake};

/// Number of usable flag bits; the upper bits of the word are reserved.
pub const MAX_BITS: u32 = 24;

const INVALID_BITS: u32 = !((1u32 << MAX_BITS) - 1);

bitflags! {
    /// How [`EventFlags::wait`] matches and consumes flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WaitMode: u8 {
        /// Return once any requested flag is set (the default).
        const ANY = 0;
        /// Return only once every requested flag is set.
        const ALL = 1 << 0;
        /// Leave the observed flags set instead of clearing them.
        const NO_CLEAR = 1 << 1;
    }
}

struct Shared {
    bits: Mutex<u32>,
    changed: Condvar,
}

impl Wake for Shared {
    fn wake(&self) {
        self.changed.notify_all();
    }
}

/// A group of event flags. Cloning yields another handle to the same group.
#[derive(Clone)]
pub struct EventFlags {
    shared: Arc<Shared>,
}

impl EventFlags {
    #[track_caller]
    pub fn new() -> Self {
        check!(
            !kernel::is_isr_context(),
            "event flags created from interrupt context"
        );
        Self {
            shared: Arc::new(Shared {
                bits: Mutex::new(0),
                changed: Condvar::new(),
            }),
        }
    }

    /// Sets `flags` and returns the flags after setting.
    #[track_caller]
    pub fn set(&self, flags: u32) -> u32 {
        validate(flags);
        let after = {
            let mut bits = self.shared.bits.lock();
            *bits |= flags;
            *bits
        };
        kernel::wake_or_defer(self.shared.clone());
        after
    }

    /// Clears `flags` and returns the flags before clearing.
    #[track_caller]
    pub fn clear(&self, flags: u32) -> u32 {
        validate(flags);
        let mut bits = self.shared.bits.lock();
        let before = *bits;
        *bits &= !flags;
        before
    }

    /// Current flags.
    pub fn get(&self) -> u32 {
        *self.shared.bits.lock()
    }

    /// Waits until the flags in `mask` satisfy `mode`.
    ///
    /// On success returns the whole flag word as it was when the condition
    /// was met, before any clearing. Unless [`WaitMode::NO_CLEAR`] is given the
    /// requested flags are cleared. When nothing matched, a zero `timeout`
    /// yields [`SyncError::Resource`] and an expired wait yields
    /// [`SyncError::Timeout`], so "no bits yet" is never confused with an
    /// empty result.
    #[track_caller]
    pub fn wait(&self, mask: u32, mode: WaitMode, timeout: Ticks) -> SyncResult<u32> {
        check!(
            !kernel::is_isr_context(),
            "event flags waited on from interrupt context"
        );
        validate(mask);

        let deadline = timeout.deadline();
        let mut expired = false;
        let mut bits = self.shared.bits.lock();
        loop {
            if matches(*bits, mask, mode) {
                let observed = *bits;
                if !mode.contains(WaitMode::NO_CLEAR) {
                    *bits &= !mask;
                }
                return Ok(observed);
            }

            if timeout.is_zero() {
                return Err(SyncError::Resource);
            }
            if expired {
                return Err(SyncError::Timeout);
            }

            match deadline {
                None => self.shared.changed.wait(&mut bits),
                Some(deadline) => {
                    // Re-checked once more at the top of the loop.
                    expired = self
                        .shared
                        .changed
                        .wait_until(&mut bits, deadline)
                        .timed_out();
                }
            }
        }
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(bits: u32, mask: u32, mode: WaitMode) -> bool {
    if mode.contains(WaitMode::ALL) {
        bits & mask == mask
    } else {
        bits & mask != 0
    }
}

#[track_caller]
fn validate(flags: u32) {
    check!(flags != 0, "empty event flag mask");
    check!(
        flags & INVALID_BITS == 0,
        "event flags {flags:#x} use reserved bits above bit {}",
        MAX_BITS - 1
    );
}
