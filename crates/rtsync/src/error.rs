//! Recoverable error types shared by all primitives.

use core::fmt;

use thiserror::Error;

use crate::kernel::Ticks;

/// Error types for synchronization primitives.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// A bounded wait expired.
    #[error("operation timed out")]
    Timeout,
    /// The operation could not complete without blocking and no wait was allowed.
    #[error("resource not available")]
    Resource,
    /// Invalid argument for the calling context (e.g. a timeout from an interrupt).
    #[error("invalid parameter")]
    Parameter,
    /// Semaphore count would exceed its maximum.
    #[error("semaphore count overflow")]
    Overflow,
    /// The receiving side has shut down.
    #[error("closed")]
    Closed,
    /// The signalling side went away without signalling.
    #[error("peer dropped before signalling")]
    Disconnected,
}

impl SyncError {
    /// Maps a failed wait to the status the caller should see: `Resource` when
    /// the caller asked not to wait at all, `Timeout` otherwise.
    pub(crate) fn wait_failed(timeout: Ticks) -> Self {
        if timeout.is_zero() {
            Self::Resource
        } else {
            Self::Timeout
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// A message that could not be queued, handed back to the sender.
pub struct PutError<T> {
    pub error: SyncError,
    pub message: T,
}

impl<T> PutError<T> {
    pub(crate) fn new(error: SyncError, message: T) -> Self {
        Self { error, message }
    }

    /// Recovers the message that was not queued.
    pub fn into_inner(self) -> T {
        self.message
    }
}

impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to queue message: {}", self.error)
    }
}

impl<T> std::error::Error for PutError<T> {}

impl<T> From<PutError<T>> for SyncError {
    fn from(value: PutError<T>) -> Self {
        value.error
    }
}
