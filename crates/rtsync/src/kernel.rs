//! Kernel shim: ticks, thread identity and interrupt context.
//!
//! Scheduling, priorities and interrupt dispatch belong to the external
//! kernel. This module exposes the handful of kernel services the primitives
//! depend on, implemented on top of the host OS so the same code paths run in
//! tests.
//!
//! Interrupt handlers are emulated with [`run_as_isr`]: the handler runs on the
//! calling thread inside a critical section with the thread flagged as
//! interrupt context. Primitives that would wake a blocked thread while in
//! that context queue the wake instead; the queue is flushed when the
//! outermost handler returns, which is this shim's equivalent of yielding from
//! an ISR.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Kernel tick frequency.
pub const TICK_RATE_HZ: u32 = 1000;

/// Timeout and delay unit, in kernel ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(pub u32);

impl Ticks {
    /// Do not wait at all.
    pub const ZERO: Self = Self(0);

    /// Wait without bound.
    pub const FOREVER: Self = Self(u32::MAX);

    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Converts milliseconds to ticks, rounding up so a non-zero request
    /// never becomes a poll.
    pub const fn from_millis(ms: u32) -> Self {
        let ticks = (ms as u64 * TICK_RATE_HZ as u64).div_ceil(1000);
        if ticks >= u32::MAX as u64 {
            Self::FOREVER
        } else {
            Self(ticks as u32)
        }
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_forever(self) -> bool {
        self.0 == u32::MAX
    }

    pub fn to_duration(self) -> Duration {
        Duration::from_micros(self.0 as u64 * 1_000_000 / TICK_RATE_HZ as u64)
    }

    /// Absolute point at which a wait started now expires; `None` for
    /// [`Ticks::FOREVER`].
    pub fn deadline(self) -> Option<Instant> {
        if self.is_forever() {
            None
        } else {
            Some(Instant::now() + self.to_duration())
        }
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_forever() {
            write!(f, "forever")
        } else {
            write!(f, "{}ticks", self.0)
        }
    }
}

/// Identity of a kernel thread, used for lock ownership diagnostics.
///
/// Zero is reserved for "no thread".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId {
    pub(crate) const NONE: u32 = 0;

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        (raw != Self::NONE).then_some(Self(raw))
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

static NEXT_THREAD_ID: AtomicU32 = AtomicU32::new(1);
static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Something a primitive needs done once the interrupt handler returns.
pub(crate) trait Wake: Send + Sync {
    fn wake(&self);
}

thread_local! {
    static CURRENT_ID: u32 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    static ISR_DEPTH: Cell<u32> = const { Cell::new(0) };
    static PENDING_WAKES: RefCell<Vec<Arc<dyn Wake>>> = const { RefCell::new(Vec::new()) };
}

/// Identity of the calling thread.
pub fn current_thread_id() -> ThreadId {
    ThreadId(CURRENT_ID.with(|id| *id))
}

/// Ticks elapsed since the kernel shim was first used.
pub fn tick_count() -> u32 {
    let elapsed = EPOCH.elapsed();
    (elapsed.as_millis() as u64 * TICK_RATE_HZ as u64 / 1000) as u32
}

/// Suspends the calling thread. Not allowed from interrupt context.
pub fn delay(ticks: Ticks) {
    check!(!is_isr_context(), "delay called from interrupt context");
    if !ticks.is_zero() && !ticks.is_forever() {
        std::thread::sleep(ticks.to_duration());
    }
}

/// True while the calling thread is executing an interrupt handler.
pub fn is_isr_context() -> bool {
    ISR_DEPTH.with(|depth| depth.get() > 0)
}

struct IsrScope;

impl IsrScope {
    fn enter() -> Self {
        ISR_DEPTH.with(|depth| depth.set(depth.get() + 1));
        IsrScope
    }
}

impl Drop for IsrScope {
    fn drop(&mut self) {
        ISR_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Runs `handler` as if it were an interrupt service routine.
///
/// Nested calls are allowed; deferred wakes are flushed only when the
/// outermost handler returns.
pub fn run_as_isr<R>(handler: impl FnOnce() -> R) -> R {
    let result = critical_section::with(|_cs| {
        let _scope = IsrScope::enter();
        handler()
    });
    if !is_isr_context() {
        yield_from_isr();
    }
    result
}

/// Queues a wake for the end of the current interrupt handler, or performs
/// it right away when called from thread context.
pub(crate) fn wake_or_defer(target: Arc<dyn Wake>) {
    if is_isr_context() {
        PENDING_WAKES.with(|pending| pending.borrow_mut().push(target));
    } else {
        target.wake();
    }
}

fn yield_from_isr() {
    let pending = PENDING_WAKES.with(|pending| core::mem::take(&mut *pending.borrow_mut()));
    if !pending.is_empty() {
        log::trace!(target: "kernel", "yield from isr: {} deferred wake(s)", pending.len());
    }
    for target in pending {
        target.wake();
    }
}
