//! Software timers.
//!
//! A [`Timer`] runs its callback once or periodically after an interval. All
//! timers share one timer service thread, started on first use, which owns
//! the schedule and invokes every callback. Callbacks therefore run one at a
//! time and should be short; long work belongs on a [`Dispatcher`] or a
//! service thread of its own.
//!
//! The schedule lock is never held while a callback runs, so a callback may
//! start, stop or reset any timer, its own included. Stopping a timer whose
//! callback is executing at that moment does not wait for the callback to
//! return.
//!
//! [`Dispatcher`]: crate::dispatcher::Dispatcher

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{SyncError, SyncResult};
use crate::kernel::{self, Ticks};
use crate::thread::{Thread, ThreadConfig, ThreadPriority};

/// Name of the timer service thread.
pub const TIMER_THREAD_NAME: &str = "timer";

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Whether a timer fires once or keeps firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires once after the interval, then stops.
    Once,
    /// Fires every interval until stopped.
    Periodic,
}

struct Armed {
    id: u64,
    kind: TimerKind,
    interval: Ticks,
    deadline: Instant,
    /// Tick count at `deadline`.
    expiry: u32,
    callback: Callback,
}

#[derive(Default)]
struct Schedule {
    armed: Vec<Armed>,
}

impl Schedule {
    fn remove(&mut self, id: u64) -> bool {
        let before = self.armed.len();
        self.armed.retain(|armed| armed.id != id);
        self.armed.len() != before
    }

    fn find(&self, id: u64) -> Option<&Armed> {
        self.armed.iter().find(|armed| armed.id == id)
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.armed.iter().map(|armed| armed.deadline).min()
    }

    /// Collects the callbacks due at `now`, in deadline order. One-shot
    /// timers are disarmed; periodic ones move to their next period.
    fn take_due(&mut self, now: Instant) -> Vec<Callback> {
        let mut due: Vec<(Instant, Callback)> = Vec::new();
        self.armed.retain_mut(|armed| {
            if armed.deadline > now {
                return true;
            }
            due.push((armed.deadline, armed.callback.clone()));
            match armed.kind {
                TimerKind::Once => false,
                TimerKind::Periodic => {
                    let period = armed.interval.to_duration();
                    armed.deadline += period;
                    armed.expiry = armed.expiry.wrapping_add(armed.interval.raw());
                    // A late service thread skips missed periods instead of
                    // firing them back to back.
                    if armed.deadline <= now {
                        armed.deadline = now + period;
                        armed.expiry = kernel::tick_count().wrapping_add(armed.interval.raw());
                    }
                    true
                }
            }
        });
        due.sort_by_key(|(deadline, _)| *deadline);
        due.into_iter().map(|(_, callback)| callback).collect()
    }
}

struct TimerService {
    schedule: Mutex<Schedule>,
    changed: Condvar,
    _thread: Thread,
}

static SERVICE: Lazy<TimerService> = Lazy::new(TimerService::start);
static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

impl TimerService {
    fn start() -> Self {
        let config = ThreadConfig::new(TIMER_THREAD_NAME)
            .with_priority(ThreadPriority::HIGH)
            .with_stack_size(4096);
        // The body blocks on `SERVICE` until this initializer returns.
        let thread = Thread::spawn(config, || SERVICE.run());
        log::debug!(target: "timer", "timer service started");
        Self {
            schedule: Mutex::new(Schedule::default()),
            changed: Condvar::new(),
            _thread: thread,
        }
    }

    fn run(&self) -> i32 {
        let mut schedule = self.schedule.lock();
        loop {
            let due = schedule.take_due(Instant::now());
            if !due.is_empty() {
                MutexGuard::unlocked(&mut schedule, || {
                    for callback in due {
                        callback();
                    }
                });
                continue;
            }
            match schedule.next_deadline() {
                Some(deadline) => {
                    self.changed.wait_until(&mut schedule, deadline);
                }
                None => self.changed.wait(&mut schedule),
            }
        }
    }

    fn arm(&self, armed: Armed) {
        let mut schedule = self.schedule.lock();
        schedule.remove(armed.id);
        schedule.armed.push(armed);
        drop(schedule);
        self.changed.notify_one();
    }

    fn disarm(&self, id: u64) -> bool {
        let removed = self.schedule.lock().remove(id);
        if removed {
            self.changed.notify_one();
        }
        removed
    }
}

/// A one-shot or periodic timer whose callback runs on the timer service
/// thread.
///
/// None of the methods may be called from interrupt context. Dropping the
/// timer stops it.
pub struct Timer {
    id: u64,
    kind: TimerKind,
    interval: Mutex<Ticks>,
    callback: Callback,
}

impl Timer {
    /// Creates a stopped timer.
    #[track_caller]
    pub fn new(kind: TimerKind, interval: Ticks, callback: impl Fn() + Send + Sync + 'static) -> Self {
        check!(
            !kernel::is_isr_context(),
            "timer created from interrupt context"
        );
        Self {
            id: NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            interval: Mutex::new(interval),
            callback: Arc::new(callback),
        }
    }

    /// Arms the timer to fire one interval from now. Starting a running
    /// timer restarts its interval.
    ///
    /// Returns [`SyncError::Parameter`] for a zero or unbounded interval.
    #[track_caller]
    pub fn start(&self) -> SyncResult<()> {
        check!(
            !kernel::is_isr_context(),
            "timer started from interrupt context"
        );
        let interval = *self.interval.lock();
        if interval.is_zero() || interval.is_forever() {
            log::error!(target: "timer", "invalid timer interval {interval}");
            return Err(SyncError::Parameter);
        }
        SERVICE.arm(Armed {
            id: self.id,
            kind: self.kind,
            interval,
            deadline: Instant::now() + interval.to_duration(),
            expiry: kernel::tick_count().wrapping_add(interval.raw()),
            callback: self.callback.clone(),
        });
        Ok(())
    }

    /// Disarms the timer. A callback already executing runs to completion.
    #[track_caller]
    pub fn stop(&self) {
        check!(
            !kernel::is_isr_context(),
            "timer stopped from interrupt context"
        );
        SERVICE.disarm(self.id);
    }

    /// Restarts the interval from now.
    #[track_caller]
    pub fn reset(&self) -> SyncResult<()> {
        self.start()
    }

    /// Changes the interval and restarts the timer.
    #[track_caller]
    pub fn reset_with(&self, interval: Ticks) -> SyncResult<()> {
        *self.interval.lock() = interval;
        self.start()
    }

    pub fn is_running(&self) -> bool {
        SERVICE.schedule.lock().find(self.id).is_some()
    }

    /// Tick count at which the timer fires next, if it is running.
    pub fn expiry_tick(&self) -> Option<u32> {
        SERVICE.schedule.lock().find(self.id).map(|armed| armed.expiry)
    }

    pub fn interval(&self) -> Ticks {
        *self.interval.lock()
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        // Never armed timers have nothing to remove; avoid starting the
        // service just to find that out.
        if Lazy::get(&SERVICE).is_some() {
            SERVICE.disarm(self.id);
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("kind", &self.kind)
            .field("interval", &self.interval())
            .finish_non_exhaustive()
    }
}
