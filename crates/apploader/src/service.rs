//! Process-wide loader handle.
//!
//! Firmware runs one loader, started by the service host and reached from
//! anywhere through [`instance`]. Tests and hosts that need several loaders
//! use [`Loader::spawn`] directly instead.

use std::sync::Arc;

use appkit::{AppRegistry, Display};
use once_cell::sync::Lazy;
use rtsync::Mutex;

use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::loader::Loader;

static INSTANCE: Lazy<Mutex<Option<Arc<Loader>>>> = Lazy::new(|| Mutex::new(None));

/// Starts the process-wide loader.
pub fn init(
    config: LoaderConfig,
    registry: Arc<dyn AppRegistry>,
    display: Arc<Display>,
) -> LoaderResult<Arc<Loader>> {
    if INSTANCE.lock().is_some() {
        return Err(LoaderError::AlreadyRunning);
    }

    // Spawning may start the root app, which can take a while; keep the
    // registry lock out of it.
    let loader = Arc::new(Loader::spawn(config, registry, display)?);

    let mut slot = INSTANCE.lock();
    if slot.is_some() {
        drop(slot);
        log::warn!(target: "loader", "concurrent init, discarding the second loader");
        loader.shutdown()?;
        return Err(LoaderError::AlreadyRunning);
    }
    *slot = Some(loader.clone());
    Ok(loader)
}

/// The process-wide loader, if it is running.
pub fn instance() -> Option<Arc<Loader>> {
    INSTANCE.lock().clone()
}

/// Stops the process-wide loader and releases the handle.
///
/// Fails with [`LoaderError::CalledFromLoaderThread`] when called from an app
/// callback; the handle stays registered so another thread can stop it.
pub fn shutdown() -> LoaderResult<()> {
    let mut slot = INSTANCE.lock();
    let loader = match slot.take() {
        Some(loader) if loader.on_loader_thread() => {
            *slot = Some(loader);
            log::error!(target: "loader", "service shutdown requested from the loader thread");
            return Err(LoaderError::CalledFromLoaderThread);
        }
        Some(loader) => loader,
        None => return Err(LoaderError::NotRunning),
    };
    drop(slot);
    loader.shutdown()
}
