//! # rtsync
//!
//! Blocking synchronization primitives and message plumbing for firmware that
//! runs on a preemptive real-time kernel. The kernel itself is external; on a
//! host build the OS scheduler stands in for it and [`kernel`] supplies the
//! pieces the primitives need (ticks, thread identity, interrupt context).
//!
//! ## Module Overview
//! - [`kernel`]        – Tick type, thread identity and interrupt-context emulation.
//! - [`mutex`]         – Non-reentrant and reentrant locks with timed acquisition.
//! - [`semaphore`]     – Counting semaphore with an interrupt-safe entry point.
//! - [`event_flag`]    – 24-bit event groups with any/all waits.
//! - [`message_queue`] – Bounded FIFO used as an actor mailbox.
//! - [`thread`]        – Named service threads.
//! - [`active`]        – Actor loop: one thread, one mailbox, one behavior.
//! - [`api_lock`]      – One-shot rendezvous between a caller and a worker.
//! - [`dispatcher`]    – Deferred work queue, many producers and one consumer.
//! - [`pubsub`]        – Synchronous fan-out to registered callbacks.
//! - [`timer`]         – One-shot and periodic timers on a shared service thread.
//!
//! Every blocking call takes an explicit [`Ticks`] timeout. Misuse that would
//! leave shared state corrupted (blocking from an interrupt, unsubscribing an
//! unknown handle, ...) is fatal and goes through [`check!`]/[`crash!`].

#[macro_use]
pub mod check;

pub mod active;
pub mod api_lock;
pub mod dispatcher;
pub mod error;
pub mod event_flag;
pub mod kernel;
pub mod message_queue;
pub mod mutex;
pub mod pubsub;
pub mod semaphore;
pub mod thread;
pub mod timer;

pub use active::{ActiveBehavior, ActiveObject, Flow};
pub use api_lock::{alloc_locked, ApiLock, ApiSignal};
pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherThread};
pub use error::{PutError, SyncError, SyncResult};
pub use event_flag::{EventFlags, WaitMode};
pub use kernel::{ThreadId, Ticks};
pub use message_queue::MessageQueue;
pub use mutex::{Mutex, MutexGuard, RecursiveMutex, RecursiveMutexGuard};
pub use pubsub::{PubSub, Subscription};
pub use semaphore::Semaphore;
pub use thread::{Thread, ThreadConfig, ThreadPriority, ThreadState};
pub use timer::{Timer, TimerKind};

#[cfg(test)]
mod tests;
