//! Counting semaphore for signalling and resource counting.
//!
//! A semaphore maintains a count and lets threads wait until the count is
//! positive, then decrements it. Releasing increments the count and wakes
//! one waiter. Releasing is allowed from interrupt context, in which case the
//! wake is deferred until the handler returns.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{SyncError, SyncResult};
use crate::kernel::{self, Ticks, Wake};

struct Shared {
    count: Mutex<u32>,
    max_count: u32,
    available: Condvar,
}

impl Wake for Shared {
    fn wake(&self) {
        self.available.notify_one();
    }
}

/// Counting semaphore. Cloning yields another handle to the same semaphore.
///
/// # Example
///
/// ```
/// use rtsync::{Semaphore, Ticks};
///
/// let sem = Semaphore::new(3, 0);
/// sem.release().unwrap();
/// assert!(sem.acquire(Ticks::ZERO).is_ok());
/// ```
#[derive(Clone)]
pub struct Semaphore {
    shared: Arc<Shared>,
}

impl Semaphore {
    /// Creates a semaphore with a maximum and an initial count.
    ///
    /// `max_count` must be positive and `initial_count` may not exceed it.
    #[track_caller]
    pub fn new(max_count: u32, initial_count: u32) -> Self {
        check!(
            !kernel::is_isr_context(),
            "semaphore created from interrupt context"
        );
        check!(
            max_count > 0 && initial_count <= max_count,
            "invalid semaphore counts: max={max_count} initial={initial_count}"
        );
        Self {
            shared: Arc::new(Shared {
                count: Mutex::new(initial_count),
                max_count,
                available: Condvar::new(),
            }),
        }
    }

    /// Creates an empty binary semaphore.
    pub fn binary() -> Self {
        Self::new(1, 0)
    }

    /// Takes one unit, waiting at most `timeout`.
    ///
    /// From interrupt context only a zero timeout is accepted; anything else
    /// returns [`SyncError::Parameter`].
    pub fn acquire(&self, timeout: Ticks) -> SyncResult<()> {
        if kernel::is_isr_context() && !timeout.is_zero() {
            return Err(SyncError::Parameter);
        }

        let deadline = timeout.deadline();
        let mut count = self.shared.count.lock();
        loop {
            if *count > 0 {
                *count -= 1;
                return Ok(());
            }
            if timeout.is_zero() {
                return Err(SyncError::Resource);
            }
            match deadline {
                None => self.shared.available.wait(&mut count),
                Some(deadline) => {
                    if self
                        .shared
                        .available
                        .wait_until(&mut count, deadline)
                        .timed_out()
                        && *count == 0
                    {
                        return Err(SyncError::Timeout);
                    }
                }
            }
        }
    }

    /// Interrupt-safe take that never blocks.
    pub fn try_acquire_from_isr(&self) -> nb::Result<(), SyncError> {
        match self.acquire(Ticks::ZERO) {
            Ok(()) => Ok(()),
            Err(SyncError::Resource) => Err(nb::Error::WouldBlock),
            Err(err) => Err(nb::Error::Other(err)),
        }
    }

    /// Gives one unit back and wakes a waiter.
    pub fn release(&self) -> SyncResult<()> {
        {
            let mut count = self.shared.count.lock();
            if *count >= self.shared.max_count {
                return Err(SyncError::Overflow);
            }
            *count += 1;
        }
        kernel::wake_or_defer(self.shared.clone());
        Ok(())
    }

    /// Returns the current count.
    pub fn count(&self) -> u32 {
        *self.shared.count.lock()
    }

    pub fn max_count(&self) -> u32 {
        self.shared.max_count
    }
}
