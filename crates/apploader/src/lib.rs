//! # apploader
//!
//! Application lifecycle supervisor. A single loader thread owns the stack of
//! running apps and processes start and stop requests from any thread one at
//! a time, driving each app through
//! `Initial -> Started -> Showing <-> Hiding -> Stopped`.
//!
//! ## Module Overview
//! - [`loader`]  – The loader handle and its actor.
//! - [`service`] – Process-wide `init` / `instance` / `shutdown`.
//! - [`config`]  – Loader configuration and builder.
//! - [`event`]   – Lifecycle events and the current-app snapshot.
//! - [`error`]   – Recoverable loader errors.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use appkit::{AppType, Bundle, Display, Manifest, ManifestRegistry};
//! use apploader::{Loader, LoaderConfig};
//!
//! let registry = Arc::new(ManifestRegistry::new());
//! registry.add(Manifest::builder("desktop").app_type(AppType::Desktop).build());
//! registry.add(Manifest::builder("settings").app_type(AppType::Settings).build());
//!
//! let config = LoaderConfig::builder().root_app("desktop").build();
//! let loader = Loader::spawn(config, registry, Arc::new(Display::new()))?;
//! loader.start("settings", Bundle::new())?;
//! loader.stop()?;
//! loader.shutdown()?;
//! # Ok::<(), apploader::LoaderError>(())
//! ```

pub mod config;
pub mod error;
pub mod event;
mod lifecycle;
pub mod loader;
mod message;
pub mod service;
mod stack;

pub use config::{LoaderConfig, LoaderConfigBuilder, APP_STACK_SIZE};
pub use error::{LoaderError, LoaderResult};
pub use event::{AppInfo, AppSnapshot, LoaderEvent};
pub use loader::Loader;
