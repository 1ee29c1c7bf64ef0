//! Mutual exclusion locks with timed acquisition.
//!
//! Two flavours are provided:
//!
//! - [`Mutex`] is non-reentrant. Acquiring it again from the thread that
//!   already holds it is a programming error and halts instead of
//!   deadlocking.
//! - [`RecursiveMutex`] may be acquired repeatedly by its holder and is only
//!   released once every guard has been dropped. Because several guards can
//!   be alive on the same thread it only hands out shared references; pair it
//!   with a `RefCell` for mutation.
//!
//! Both are built on `parking_lot` and record the owning [`ThreadId`] for
//! diagnostics. Neither may be used from interrupt context. Release happens
//! when the guard is dropped, so releasing a lock that is not held cannot be
//! expressed.

use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::{SyncError, SyncResult};
use crate::kernel::{self, ThreadId, Ticks};

/// Non-reentrant lock protecting a value.
pub struct Mutex<T: ?Sized> {
    owner: AtomicU32,
    inner: parking_lot::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Creates a new mutex protecting the given value.
    pub fn new(value: T) -> Self {
        Self {
            owner: AtomicU32::new(ThreadId::NONE),
            inner: parking_lot::Mutex::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires the mutex, waiting at most `timeout`.
    ///
    /// Returns [`SyncError::Timeout`] when a non-zero wait expires and
    /// [`SyncError::Resource`] when `timeout` is zero and the lock is taken.
    /// The caller decides whether to retry.
    #[track_caller]
    pub fn acquire(&self, timeout: Ticks) -> SyncResult<MutexGuard<'_, T>> {
        let me = self.precheck();
        let guard = if timeout.is_zero() {
            self.inner.try_lock()
        } else if timeout.is_forever() {
            Some(self.inner.lock())
        } else {
            self.inner.try_lock_for(timeout.to_duration())
        };

        match guard {
            Some(guard) => {
                self.owner.store(me.raw(), Ordering::Release);
                Ok(MutexGuard {
                    owner: &self.owner,
                    guard,
                })
            }
            None => Err(SyncError::wait_failed(timeout)),
        }
    }

    /// Acquires the mutex, blocking until it becomes available.
    #[track_caller]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let me = self.precheck();
        let guard = self.inner.lock();
        self.owner.store(me.raw(), Ordering::Release);
        MutexGuard {
            owner: &self.owner,
            guard,
        }
    }

    /// Thread currently holding the lock, if any.
    pub fn owner(&self) -> Option<ThreadId> {
        ThreadId::from_raw(self.owner.load(Ordering::Acquire))
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    #[track_caller]
    fn precheck(&self) -> ThreadId {
        check!(
            !kernel::is_isr_context(),
            "mutex acquired from interrupt context"
        );
        let me = kernel::current_thread_id();
        // Only this thread can have stored its own id, so a match means we
        // already hold the lock.
        check!(
            self.owner.load(Ordering::Acquire) != me.raw(),
            "non-recursive mutex re-acquired by its owner {me}"
        );
        me
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.is_locked())
            .field("owner", &self.owner())
            .finish_non_exhaustive()
    }
}

/// Scoped ownership of a [`Mutex`]; the lock is released on drop.
#[must_use = "the mutex is released as soon as the guard is dropped"]
pub struct MutexGuard<'a, T: ?Sized> {
    owner: &'a AtomicU32,
    guard: parking_lot::MutexGuard<'a, T>,
}

impl<T: ?Sized> MutexGuard<'_, T> {
    /// Releases the lock early.
    pub fn unlock(self) {
        drop(self);
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // Cleared before the inner guard unlocks.
        self.owner.store(ThreadId::NONE, Ordering::Release);
    }
}

/// Lock that may be re-acquired by the thread holding it.
pub struct RecursiveMutex<T: ?Sized> {
    owner: AtomicU32,
    depth: AtomicU32,
    inner: parking_lot::ReentrantMutex<T>,
}

impl<T> RecursiveMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            owner: AtomicU32::new(ThreadId::NONE),
            depth: AtomicU32::new(0),
            inner: parking_lot::ReentrantMutex::new(value),
        }
    }
}

impl<T: ?Sized> RecursiveMutex<T> {
    /// Acquires the lock, waiting at most `timeout` unless the caller already
    /// holds it, in which case this returns immediately.
    #[track_caller]
    pub fn acquire(&self, timeout: Ticks) -> SyncResult<RecursiveMutexGuard<'_, T>> {
        check!(
            !kernel::is_isr_context(),
            "recursive mutex acquired from interrupt context"
        );
        let guard = if timeout.is_zero() {
            self.inner.try_lock()
        } else if timeout.is_forever() {
            Some(self.inner.lock())
        } else {
            self.inner.try_lock_for(timeout.to_duration())
        };

        match guard {
            Some(guard) => {
                self.depth.fetch_add(1, Ordering::AcqRel);
                self.owner
                    .store(kernel::current_thread_id().raw(), Ordering::Release);
                Ok(RecursiveMutexGuard {
                    owner: &self.owner,
                    depth: &self.depth,
                    guard,
                })
            }
            None => Err(SyncError::wait_failed(timeout)),
        }
    }

    /// Acquires the lock, blocking until it becomes available.
    #[track_caller]
    pub fn lock(&self) -> RecursiveMutexGuard<'_, T> {
        match self.acquire(Ticks::FOREVER) {
            Ok(guard) => guard,
            Err(err) => crash!("unbounded recursive mutex acquire failed: {err}"),
        }
    }

    pub fn owner(&self) -> Option<ThreadId> {
        ThreadId::from_raw(self.owner.load(Ordering::Acquire))
    }

    /// Number of live guards held by the owner.
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl<T: Default> Default for RecursiveMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for RecursiveMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecursiveMutex")
            .field("owner", &self.owner())
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

/// Scoped ownership of a [`RecursiveMutex`].
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct RecursiveMutexGuard<'a, T: ?Sized> {
    owner: &'a AtomicU32,
    depth: &'a AtomicU32,
    guard: parking_lot::ReentrantMutexGuard<'a, T>,
}

impl<T: ?Sized> Deref for RecursiveMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: ?Sized> Drop for RecursiveMutexGuard<'_, T> {
    fn drop(&mut self) {
        if self.depth.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.owner.store(ThreadId::NONE, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use std::sync::Arc;

    #[test]
    fn mutex_lock_unlock() {
        let mutex = Mutex::new(5);
        assert!(mutex.owner().is_none());

        {
            let mut guard = mutex.acquire(Ticks::FOREVER).expect("acquire");
            *guard += 1;
            assert!(mutex.is_locked());
            assert_eq!(mutex.owner(), Some(kernel::current_thread_id()));
        }

        assert!(!mutex.is_locked());
        assert!(mutex.owner().is_none());
        assert_eq!(*mutex.lock(), 6);
    }

    #[test]
    fn contended_acquire_times_out() {
        let mutex = Arc::new(Mutex::new(()));
        let guard = mutex.lock();

        let contender = mutex.clone();
        let results = std::thread::spawn(move || {
            let polled = contender.acquire(Ticks::ZERO).map(|_| ());
            let waited = contender.acquire(Ticks(20)).map(|_| ());
            (polled, waited)
        })
        .join()
        .unwrap();

        assert_eq!(results.0, Err(SyncError::Resource));
        assert_eq!(results.1, Err(SyncError::Timeout));
        guard.unlock();
        assert!(mutex.acquire(Ticks::ZERO).is_ok());
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let mutex = Arc::new(Mutex::new(Vec::new()));
        let guard = mutex.lock();

        let waiter = mutex.clone();
        let handle = std::thread::spawn(move || {
            waiter.acquire(Ticks(2_000)).expect("acquire").push(2);
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        drop(guard);
        handle.join().unwrap();
        assert_eq!(*mutex.lock(), vec![2]);
    }

    #[test]
    #[should_panic(expected = "re-acquired by its owner")]
    fn reacquire_by_owner_is_fatal() {
        let mutex = Mutex::new(());
        let _first = mutex.lock();
        let _second = mutex.acquire(Ticks::ZERO);
    }

    #[test]
    #[should_panic(expected = "interrupt context")]
    fn acquire_from_isr_is_fatal() {
        let mutex = Mutex::new(());
        kernel::run_as_isr(|| {
            let _guard = mutex.acquire(Ticks::ZERO);
        });
    }

    #[test]
    fn recursive_mutex_counts_depth() {
        let mutex = RecursiveMutex::new(RefCell::new(0));

        let outer = mutex.lock();
        *outer.borrow_mut() += 1;
        {
            let inner = mutex.acquire(Ticks::ZERO).expect("reentrant acquire");
            *inner.borrow_mut() += 1;
            assert_eq!(mutex.depth(), 2);
        }
        assert_eq!(mutex.depth(), 1);
        assert_eq!(mutex.owner(), Some(kernel::current_thread_id()));
        drop(outer);

        assert_eq!(mutex.depth(), 0);
        assert!(mutex.owner().is_none());
        assert_eq!(*mutex.lock().borrow(), 2);
    }

    #[test]
    fn recursive_mutex_excludes_other_threads() {
        let mutex = Arc::new(RecursiveMutex::new(()));
        let _held = mutex.lock();
        let _again = mutex.lock();

        let other = mutex.clone();
        let result = std::thread::spawn(move || other.acquire(Ticks(10)).map(|_| ()))
            .join()
            .unwrap();
        assert_eq!(result, Err(SyncError::Timeout));
    }
}
