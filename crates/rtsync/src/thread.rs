//! Named service threads.
//!
//! A [`Thread`] is a blocking thread with its own stack, used for long-lived
//! services (the Loader, a dispatcher consumer, ...). It runs a body that
//! returns an exit code and may block on any primitive in this crate.
//!
//! Priorities are advisory: scheduling belongs to the external kernel and the
//! host OS ignores them, but they are kept so configurations carry over.

use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::kernel::{self, ThreadId};

/// Scheduling priority of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadPriority(pub u8);

impl ThreadPriority {
    pub const IDLE: Self = Self(0);
    pub const LOW: Self = Self(1);
    pub const NORMAL: Self = Self(2);
    pub const HIGH: Self = Self(3);
    pub const ISR: Self = Self(4);
}

impl Default for ThreadPriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Thread execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Created, not started yet.
    Ready,
    /// `start` was called; the body has not begun executing.
    Starting,
    /// The body is executing.
    Running,
    /// The body has returned (or unwound).
    Terminated,
}

impl ThreadState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Ready,
            1 => Self::Starting,
            2 => Self::Running,
            _ => Self::Terminated,
        }
    }

    fn raw(self) -> u8 {
        match self {
            Self::Ready => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::Terminated => 3,
        }
    }
}

/// Thread body; the returned value is the exit code reported by `join`.
pub type ThreadBody = Box<dyn FnOnce() -> i32 + Send>;

/// Configuration for creating a thread.
#[derive(Debug, Clone)]
pub struct ThreadConfig {
    pub name: String,
    pub priority: ThreadPriority,
    /// Stack size in bytes.
    pub stack_size: usize,
}

impl ThreadConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: ThreadPriority::NORMAL,
            stack_size: 4096,
        }
    }

    pub fn with_priority(mut self, priority: ThreadPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }
}

struct Shared {
    state: AtomicU8,
    id: AtomicU32,
}

impl Shared {
    fn set_state(&self, state: ThreadState) {
        self.state.store(state.raw(), Ordering::Release);
    }
}

/// Marks the thread terminated even when the body unwinds.
struct TerminateOnExit(Arc<Shared>);

impl Drop for TerminateOnExit {
    fn drop(&mut self) {
        self.0.set_state(ThreadState::Terminated);
    }
}

/// A kernel thread running a single body.
pub struct Thread {
    config: ThreadConfig,
    shared: Arc<Shared>,
    body: Mutex<Option<ThreadBody>>,
    handle: Option<JoinHandle<i32>>,
}

impl Thread {
    /// Creates a thread in the `Ready` state.
    pub fn new(config: ThreadConfig, body: impl FnOnce() -> i32 + Send + 'static) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                state: AtomicU8::new(ThreadState::Ready.raw()),
                id: AtomicU32::new(ThreadId::NONE),
            }),
            body: Mutex::new(Some(Box::new(body))),
            handle: None,
        }
    }

    /// Creates and starts a thread.
    #[track_caller]
    pub fn spawn(config: ThreadConfig, body: impl FnOnce() -> i32 + Send + 'static) -> Self {
        let mut thread = Self::new(config, body);
        thread.start();
        thread
    }

    /// Starts executing the body. Starting a thread twice is fatal.
    #[track_caller]
    pub fn start(&mut self) {
        let body = match self.body.get_mut().take() {
            Some(body) => body,
            None => crash!("thread '{}' started twice", self.config.name),
        };

        self.shared.set_state(ThreadState::Starting);
        let shared = self.shared.clone();
        let spawned = std::thread::Builder::new()
            .name(self.config.name.clone())
            .stack_size(self.config.stack_size.max(MIN_HOST_STACK))
            .spawn(move || {
                shared
                    .id
                    .store(kernel::current_thread_id().raw(), Ordering::Release);
                shared.set_state(ThreadState::Running);
                let _exit = TerminateOnExit(shared);
                body()
            });

        match spawned {
            Ok(handle) => {
                log::debug!(
                    target: "thread",
                    "started '{}' (priority {}, stack {})",
                    self.config.name,
                    self.config.priority.0,
                    self.config.stack_size
                );
                self.handle = Some(handle);
            }
            Err(err) => crash!("failed to spawn thread '{}': {err}", self.config.name),
        }
    }

    /// Waits for the body to return and yields its exit code.
    ///
    /// Joining a thread that was never started, or joining from the thread
    /// itself, is fatal. A body that panicked is reported fatally here.
    #[track_caller]
    pub fn join(&mut self) -> i32 {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => crash!("thread '{}' joined without being started", self.config.name),
        };
        check!(
            self.id() != Some(kernel::current_thread_id()),
            "thread '{}' joined from itself",
            self.config.name
        );
        match handle.join() {
            Ok(code) => code,
            Err(_) => crash!("thread '{}' panicked", self.config.name),
        }
    }

    /// Kernel identity of the running thread, once it has begun executing.
    pub fn id(&self) -> Option<ThreadId> {
        ThreadId::from_raw(self.shared.id.load(Ordering::Acquire))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn priority(&self) -> ThreadPriority {
        self.config.priority
    }

    pub fn state(&self) -> ThreadState {
        ThreadState::from_raw(self.shared.state.load(Ordering::Acquire))
    }

    pub fn is_finished(&self) -> bool {
        self.state() == ThreadState::Terminated
    }
}

// Host threads need more than a microcontroller stack for formatting and
// unwinding.
const MIN_HOST_STACK: usize = 64 * 1024;

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.config.name)
            .field("priority", &self.config.priority)
            .field("state", &self.state())
            .field("stack_size", &self.config.stack_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_creation() {
        let config = ThreadConfig::new("worker")
            .with_priority(ThreadPriority::HIGH)
            .with_stack_size(8192);

        let thread = Thread::new(config, || 0);
        assert_eq!(thread.name(), "worker");
        assert_eq!(thread.priority(), ThreadPriority::HIGH);
        assert_eq!(thread.state(), ThreadState::Ready);
        assert!(thread.id().is_none());
    }

    #[test]
    fn join_returns_exit_code() {
        let mut thread = Thread::spawn(ThreadConfig::new("exit-code"), || 42);
        assert_eq!(thread.join(), 42);
        assert_eq!(thread.state(), ThreadState::Terminated);
        assert!(thread.id().is_some());
        assert_ne!(thread.id(), Some(kernel::current_thread_id()));
    }

    #[test]
    #[should_panic(expected = "started twice")]
    fn double_start_is_fatal() {
        let mut thread = Thread::spawn(ThreadConfig::new("twice"), || 0);
        thread.start();
    }

    #[test]
    #[should_panic(expected = "panicked")]
    fn panicking_body_is_reported_at_join() {
        let mut thread = Thread::spawn(ThreadConfig::new("boom"), || panic!("body failed"));
        thread.join();
    }
}
