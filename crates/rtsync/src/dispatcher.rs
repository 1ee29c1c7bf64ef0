//! Deferred work queue: many producers, one consumer.
//!
//! Producers [`dispatch`](Dispatcher::dispatch) closures from any thread; the
//! owning service thread calls [`consume`](Dispatcher::consume) in its run
//! loop and executes them in FIFO order. The internal lock is only held to
//! push or pop a single item, never while a closure runs, so a slow callback
//! cannot starve producers.
//!
//! There is no hard limit on outstanding items. Crossing the backpressure
//! threshold logs a warning so a consumer that falls behind is visible.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::SyncResult;
use crate::event_flag::{EventFlags, WaitMode};
use crate::kernel::Ticks;
use crate::mutex::Mutex;
use crate::thread::{Thread, ThreadConfig};

/// Default outstanding depth at which a backpressure warning is emitted.
pub const BACKPRESSURE_WARNING_COUNT: usize = 100;

const WORK_AVAILABLE: u32 = 1 << 0;

type Job = Box<dyn FnOnce() + Send>;

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub backpressure_threshold: usize,
    /// Maximum items executed by one `consume` call; `None` drains the queue.
    pub drain_limit: Option<usize>,
    /// Lock timeout used for each pop while draining.
    pub consume_lock_timeout: Ticks,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            backpressure_threshold: BACKPRESSURE_WARNING_COUNT,
            drain_limit: None,
            consume_lock_timeout: Ticks(10),
        }
    }
}

impl DispatcherConfig {
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::default()
    }
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl DispatcherConfigBuilder {
    /// Sets the outstanding depth that triggers a warning.
    pub fn backpressure_threshold(mut self, threshold: usize) -> Self {
        self.config.backpressure_threshold = threshold;
        self
    }

    /// Caps the number of items run per `consume` call.
    pub fn drain_limit(mut self, limit: usize) -> Self {
        self.config.drain_limit = Some(limit);
        self
    }

    pub fn consume_lock_timeout(mut self, timeout: Ticks) -> Self {
        self.config.consume_lock_timeout = timeout;
        self
    }

    pub fn build(self) -> DispatcherConfig {
        self.config
    }
}

/// Thread-safe queue of deferred closures.
pub struct Dispatcher {
    config: DispatcherConfig,
    queue: Mutex<VecDeque<Job>>,
    work: EventFlags,
    warnings: AtomicUsize,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            queue: Mutex::new(VecDeque::new()),
            work: EventFlags::new(),
            warnings: AtomicUsize::new(0),
        }
    }

    /// Queues `job` for the consumer thread.
    ///
    /// `timeout` bounds only the wait for the internal lock. On failure the
    /// job is dropped unexecuted and the error is returned; callers are
    /// expected to log and move on rather than retry.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static, timeout: Ticks) -> SyncResult<()> {
        let mut queue = match self.queue.acquire(timeout) {
            Ok(queue) => queue,
            Err(err) => {
                log::error!(target: "dispatcher", "dispatch failed to lock queue: {err}");
                return Err(err);
            }
        };
        queue.push_back(Box::new(job));
        let depth = queue.len();
        drop(queue);

        if depth == self.config.backpressure_threshold {
            self.warnings.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                target: "dispatcher",
                "{depth} items pending, consumer is falling behind"
            );
        }

        self.work.set(WORK_AVAILABLE);
        Ok(())
    }

    /// Waits up to `timeout` for work, then runs queued items in order.
    ///
    /// Returns the number of items executed. The timeout bounds only the
    /// initial wait: once work is available the queue is drained until empty
    /// (or until the configured drain limit).
    pub fn consume(&self, timeout: Ticks) -> usize {
        if self
            .work
            .wait(WORK_AVAILABLE, WaitMode::ANY, timeout)
            .is_err()
        {
            return 0;
        }

        let mut processed = 0;
        loop {
            if let Some(limit) = self.config.drain_limit {
                if processed >= limit {
                    if self.pending() > 0 {
                        self.work.set(WORK_AVAILABLE);
                    }
                    break;
                }
            }

            let job = match self.queue.acquire(self.config.consume_lock_timeout) {
                Ok(mut queue) => queue.pop_front(),
                Err(err) => {
                    log::warn!(target: "dispatcher", "consume failed to lock queue: {err}");
                    self.work.set(WORK_AVAILABLE);
                    break;
                }
            };

            match job {
                Some(job) => {
                    job();
                    processed += 1;
                }
                None => break,
            }
        }
        processed
    }

    /// Items queued and not yet started.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of times the backpressure threshold has been crossed.
    pub fn backpressure_warnings(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("warnings", &self.backpressure_warnings())
            .finish_non_exhaustive()
    }
}

/// A thread that consumes a dispatcher until stopped.
pub struct DispatcherThread {
    dispatcher: Arc<Dispatcher>,
    running: Arc<AtomicBool>,
    thread: Thread,
}

impl DispatcherThread {
    pub fn spawn(dispatcher: Arc<Dispatcher>, config: ThreadConfig) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let consumer = dispatcher.clone();
        let flag = running.clone();
        let thread = Thread::spawn(config, move || {
            while flag.load(Ordering::Acquire) {
                consumer.consume(Ticks::FOREVER);
            }
            while consumer.consume(Ticks::ZERO) > 0 {}
            0
        });
        Self {
            dispatcher,
            running,
            thread,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Lets already-queued items run, then stops the consumer and joins it.
    #[track_caller]
    pub fn stop(mut self) -> i32 {
        self.running.store(false, Ordering::Release);
        // The no-op wakes the consumer; it runs after everything queued before it.
        if let Err(err) = self.dispatcher.dispatch(|| {}, Ticks::FOREVER) {
            crash!("failed to wake dispatcher thread: {err}");
        }
        self.thread.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::sync::mpsc;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Arc<StdMutex<Vec<u32>>>, impl Fn(u32) -> Box<dyn FnOnce() + Send>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let make = move |value: u32| {
            let sink = sink.clone();
            Box::new(move || sink.lock().unwrap().push(value)) as Box<dyn FnOnce() + Send>
        };
        (seen, make)
    }

    /// Holds the dispatcher's queue lock on another thread until the
    /// returned sender is dropped.
    fn hold_queue(
        dispatcher: &Arc<Dispatcher>,
    ) -> (mpsc::Sender<()>, std::thread::JoinHandle<()>) {
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = dispatcher.clone();
        let handle = std::thread::spawn(move || {
            let _queue = holder.queue.lock();
            locked_tx.send(()).unwrap();
            let _ = release_rx.recv();
        });
        locked_rx.recv().unwrap();
        (release_tx, handle)
    }

    #[test]
    fn consume_drains_in_fifo_order() {
        let dispatcher = Dispatcher::default();
        let (seen, make) = recorder();

        for value in 0..10 {
            dispatcher.dispatch(make(value), Ticks::ZERO).unwrap();
        }
        assert_eq!(dispatcher.pending(), 10);

        assert_eq!(dispatcher.consume(Ticks::ZERO), 10);
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn idle_consume_returns_zero() {
        let dispatcher = Dispatcher::default();
        assert_eq!(dispatcher.consume(Ticks::ZERO), 0);
        assert_eq!(dispatcher.consume(Ticks(10)), 0);
    }

    #[test]
    fn backpressure_warns_once_per_crossing() {
        let dispatcher = Dispatcher::new(
            DispatcherConfig::builder().backpressure_threshold(3).build(),
        );

        for _ in 0..5 {
            dispatcher.dispatch(|| {}, Ticks::ZERO).unwrap();
        }
        assert_eq!(dispatcher.backpressure_warnings(), 1);

        dispatcher.consume(Ticks::ZERO);
        for _ in 0..3 {
            dispatcher.dispatch(|| {}, Ticks::ZERO).unwrap();
        }
        assert_eq!(dispatcher.backpressure_warnings(), 2);
    }

    #[test]
    fn drain_limit_rearms_work_bit() {
        let dispatcher = Dispatcher::new(DispatcherConfig::builder().drain_limit(2).build());
        let (seen, make) = recorder();
        for value in 0..5 {
            dispatcher.dispatch(make(value), Ticks::ZERO).unwrap();
        }

        assert_eq!(dispatcher.consume(Ticks::ZERO), 2);
        assert_eq!(dispatcher.consume(Ticks::ZERO), 2);
        assert_eq!(dispatcher.consume(Ticks::ZERO), 1);
        assert_eq!(dispatcher.consume(Ticks::ZERO), 0);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn dispatch_under_contention_drops_the_job() {
        let dispatcher = Arc::new(Dispatcher::default());
        let (seen, make) = recorder();

        let (release, holder) = hold_queue(&dispatcher);
        assert_eq!(dispatcher.dispatch(make(1), Ticks(5)), Err(SyncError::Timeout));
        assert_eq!(dispatcher.dispatch(make(2), Ticks::ZERO), Err(SyncError::Resource));
        drop(release);
        holder.join().unwrap();

        assert_eq!(dispatcher.pending(), 0);
        assert_eq!(dispatcher.consume(Ticks::ZERO), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn contended_consume_rearms_and_retries() {
        let dispatcher = Arc::new(Dispatcher::new(
            DispatcherConfig::builder()
                .consume_lock_timeout(Ticks(5))
                .build(),
        ));
        let (seen, make) = recorder();
        dispatcher.dispatch(make(7), Ticks::ZERO).unwrap();

        let (release, holder) = hold_queue(&dispatcher);
        assert_eq!(dispatcher.consume(Ticks::ZERO), 0);
        drop(release);
        holder.join().unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(dispatcher.pending(), 1);
        // The work bit was re-armed, so a non-waiting consume finds the item.
        assert_eq!(dispatcher.consume(Ticks::ZERO), 1);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn dropped_dispatcher_never_runs_queued_items() {
        let (seen, make) = recorder();
        {
            let dispatcher = Dispatcher::default();
            dispatcher.dispatch(make(1), Ticks::ZERO).unwrap();
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn dispatcher_thread_runs_items_then_stops() {
        let dispatcher = Arc::new(Dispatcher::default());
        let worker = DispatcherThread::spawn(dispatcher.clone(), ThreadConfig::new("dispatch"));
        let (seen, make) = recorder();

        for value in 0..20 {
            dispatcher.dispatch(make(value), Ticks(1_000)).unwrap();
        }
        assert_eq!(worker.stop(), 0);
        assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }
}
