use rtsync::SyncError;
use thiserror::Error;

/// Recoverable loader failures, reported to blocking callers and logged for
/// detached ones.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("unknown app \"{0}\"")]
    UnknownApp(String),

    #[error("app \"{0}\" is single-instance and already running")]
    AppAlreadyStarted(String),

    #[error("app stack limit of {0} reached")]
    StackFull(usize),

    #[error("can't stop root app")]
    CannotStopRoot,

    #[error("no app running")]
    NoAppRunning,

    #[error("loader is not running")]
    NotRunning,

    #[error("loader is already running")]
    AlreadyRunning,

    #[error("invalid loader configuration: {0}")]
    InvalidConfig(String),

    /// A blocking request was made from the loader thread, which would wait
    /// on itself.
    #[error("blocking loader request issued from the loader thread")]
    CalledFromLoaderThread,

    /// Queueing the request or waiting for its reply failed.
    #[error("loader request failed: {0}")]
    Sync(#[from] SyncError),
}

pub type LoaderResult<T> = Result<T, LoaderError>;
