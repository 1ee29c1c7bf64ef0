//! Bounded FIFO message queue.
//!
//! Used as the mailbox of an actor thread: any number of producers `put`,
//! one consumer `get`s. Interrupt handlers may use the queue with a zero
//! timeout only.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{PutError, SyncError, SyncResult};
use crate::kernel::{self, Ticks, Wake};

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

struct Receivers<T>(Arc<Shared<T>>);

impl<T: Send> Wake for Receivers<T> {
    fn wake(&self) {
        self.0.not_empty.notify_one();
    }
}

struct Senders<T>(Arc<Shared<T>>);

impl<T: Send> Wake for Senders<T> {
    fn wake(&self) {
        self.0.not_full.notify_one();
    }
}

/// Bounded multi-producer queue. Cloning yields another handle to the same
/// queue.
pub struct MessageQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for MessageQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + 'static> MessageQueue<T> {
    /// Creates a queue holding at most `capacity` messages.
    #[track_caller]
    pub fn new(capacity: usize) -> Self {
        check!(capacity > 0, "message queue capacity must be positive");
        check!(
            !kernel::is_isr_context(),
            "message queue created from interrupt context"
        );
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
        }
    }

    /// Appends a message, waiting at most `timeout` for room.
    ///
    /// On failure the message is handed back inside the [`PutError`].
    pub fn put(&self, message: T, timeout: Ticks) -> Result<(), PutError<T>> {
        if kernel::is_isr_context() && !timeout.is_zero() {
            return Err(PutError::new(SyncError::Parameter, message));
        }

        let deadline = timeout.deadline();
        let mut expired = false;
        let mut queue = self.shared.queue.lock();
        while queue.len() >= self.shared.capacity {
            if timeout.is_zero() {
                return Err(PutError::new(SyncError::Resource, message));
            }
            if expired {
                return Err(PutError::new(SyncError::Timeout, message));
            }
            match deadline {
                None => self.shared.not_full.wait(&mut queue),
                Some(deadline) => {
                    expired = self
                        .shared
                        .not_full
                        .wait_until(&mut queue, deadline)
                        .timed_out();
                }
            }
        }
        queue.push_back(message);
        drop(queue);

        kernel::wake_or_defer(Arc::new(Receivers(self.shared.clone())));
        Ok(())
    }

    /// Removes the oldest message, waiting at most `timeout` for one.
    pub fn get(&self, timeout: Ticks) -> SyncResult<T> {
        if kernel::is_isr_context() && !timeout.is_zero() {
            return Err(SyncError::Parameter);
        }

        let deadline = timeout.deadline();
        let mut expired = false;
        let mut queue = self.shared.queue.lock();
        loop {
            if let Some(message) = queue.pop_front() {
                drop(queue);
                kernel::wake_or_defer(Arc::new(Senders(self.shared.clone())));
                return Ok(message);
            }
            if timeout.is_zero() {
                return Err(SyncError::Resource);
            }
            if expired {
                return Err(SyncError::Timeout);
            }
            match deadline {
                None => self.shared.not_empty.wait(&mut queue),
                Some(deadline) => {
                    expired = self
                        .shared
                        .not_empty
                        .wait_until(&mut queue, deadline)
                        .timed_out();
                }
            }
        }
    }

    /// Interrupt-safe receive that never blocks.
    pub fn try_get_from_isr(&self) -> nb::Result<T, SyncError> {
        match self.get(Ticks::ZERO) {
            Ok(message) => Ok(message),
            Err(SyncError::Resource) => Err(nb::Error::WouldBlock),
            Err(err) => Err(nb::Error::Other(err)),
        }
    }

    /// Drops every queued message and returns how many there were.
    pub fn reset(&self) -> usize {
        let dropped: Vec<T> = self.shared.queue.lock().drain(..).collect();
        let count = dropped.len();
        self.shared.not_full.notify_all();
        count
    }
}

impl<T> MessageQueue<T> {
    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn messages_come_out_in_order() {
        let queue = MessageQueue::new(4);
        queue.put(1, Ticks::ZERO).unwrap();
        queue.put(2, Ticks::ZERO).unwrap();
        queue.put(3, Ticks::ZERO).unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.get(Ticks::ZERO), Ok(1));
        assert_eq!(queue.get(Ticks::ZERO), Ok(2));
        assert_eq!(queue.get(Ticks::ZERO), Ok(3));
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_hands_message_back() {
        let queue = MessageQueue::new(1);
        queue.put("first", Ticks::ZERO).unwrap();

        let err = queue.put("second", Ticks::ZERO).unwrap_err();
        assert_eq!(err.error, SyncError::Resource);
        assert_eq!(err.into_inner(), "second");

        let err = queue.put("third", Ticks(10)).unwrap_err();
        assert_eq!(err.error, SyncError::Timeout);
    }

    #[test]
    fn blocked_put_resumes_after_get() {
        let queue = MessageQueue::new(1);
        queue.put(1u32, Ticks::ZERO).unwrap();

        let producer = queue.clone();
        let handle = std::thread::spawn(move || producer.put(2, Ticks(2_000)).is_ok());

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.get(Ticks::ZERO), Ok(1));
        assert!(handle.join().unwrap());
        assert_eq!(queue.get(Ticks(2_000)), Ok(2));
    }

    #[test]
    fn empty_get_reports_resource_or_timeout() {
        let queue: MessageQueue<u8> = MessageQueue::new(2);
        assert_eq!(queue.get(Ticks::ZERO), Err(SyncError::Resource));
        assert_eq!(queue.get(Ticks(10)), Err(SyncError::Timeout));
    }

    #[test]
    fn isr_access_requires_zero_timeout() {
        let queue = MessageQueue::new(2);
        kernel::run_as_isr(|| {
            assert_eq!(queue.put(7u8, Ticks(1)).unwrap_err().error, SyncError::Parameter);
            assert!(queue.put(7u8, Ticks::ZERO).is_ok());
            assert_eq!(queue.get(Ticks(1)), Err(SyncError::Parameter));
            assert_eq!(queue.try_get_from_isr(), Ok(7));
            assert_eq!(queue.try_get_from_isr(), Err(nb::Error::WouldBlock));
        });
    }

    #[test]
    fn reset_drops_pending_messages() {
        let queue = MessageQueue::new(3);
        queue.put(1, Ticks::ZERO).unwrap();
        queue.put(2, Ticks::ZERO).unwrap();
        assert_eq!(queue.reset(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 3);
    }
}
