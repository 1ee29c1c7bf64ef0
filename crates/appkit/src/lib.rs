//! # appkit
//!
//! The application model the loader drives: what an app is ([`Manifest`],
//! [`App`]), what it is started with ([`Bundle`]), where installed apps are
//! looked up ([`AppRegistry`]) and where they draw ([`Display`]).
//!
//! ## Module Overview
//! - [`bundle`]   – Typed key/value parameters.
//! - [`manifest`] – App descriptors, types and flags.
//! - [`app`]      – The `App` trait, per-launch context and lifecycle states.
//! - [`registry`] – Manifest lookup.
//! - [`display`]  – The shared, reentrantly locked rendering surface.
//!
//! Enable the `serde` feature to serialize bundles.

pub mod app;
pub mod bundle;
pub mod display;
pub mod manifest;
pub mod registry;

pub use app::{App, AppContext, AppState, LaunchId};
pub use bundle::{Bundle, BundleValue};
pub use display::{Display, DisplayGuard, Surface};
pub use manifest::{AppFactory, AppFlags, AppType, Manifest, ManifestBuilder};
pub use registry::{AppRegistry, ManifestRegistry};
