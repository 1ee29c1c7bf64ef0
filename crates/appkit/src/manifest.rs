//! Application descriptors.

use core::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::app::App;

/// Broad category of an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppType {
    /// The launcher that sits at the bottom of the app stack.
    Desktop,
    System,
    Settings,
    User,
}

bitflags! {
    /// Screen furniture shown around an app.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AppFlags: u8 {
        const SHOW_STATUSBAR = 1 << 0;
        const SHOW_TOOLBAR = 1 << 1;
    }
}

impl AppFlags {
    /// Default furniture for an app type: the desktop has no toolbar.
    pub fn for_type(app_type: AppType) -> Self {
        match app_type {
            AppType::Desktop => AppFlags::SHOW_STATUSBAR,
            _ => AppFlags::SHOW_STATUSBAR | AppFlags::SHOW_TOOLBAR,
        }
    }
}

/// Creates a fresh app instance for each launch.
pub type AppFactory = Arc<dyn Fn() -> Box<dyn App> + Send + Sync>;

/// Describes an installable app: identity, type and instance factory.
#[derive(Clone)]
pub struct Manifest {
    id: String,
    name: String,
    app_type: AppType,
    flags: AppFlags,
    single_instance: bool,
    factory: AppFactory,
}

struct Blank;

impl App for Blank {}

impl Manifest {
    pub fn builder(id: impl Into<String>) -> ManifestBuilder {
        ManifestBuilder::new(id.into())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app_type(&self) -> AppType {
        self.app_type
    }

    pub fn flags(&self) -> AppFlags {
        self.flags
    }

    /// At most one launch of this app may be on the stack at a time.
    pub fn single_instance(&self) -> bool {
        self.single_instance
    }

    /// Creates a new instance.
    pub fn instantiate(&self) -> Box<dyn App> {
        (self.factory)()
    }
}

impl fmt::Debug for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifest")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("app_type", &self.app_type)
            .field("flags", &self.flags)
            .field("single_instance", &self.single_instance)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Manifest`].
pub struct ManifestBuilder {
    id: String,
    name: Option<String>,
    app_type: AppType,
    flags: Option<AppFlags>,
    single_instance: bool,
    factory: AppFactory,
}

impl ManifestBuilder {
    fn new(id: String) -> Self {
        Self {
            id,
            name: None,
            app_type: AppType::User,
            flags: None,
            single_instance: false,
            factory: Arc::new(|| Box::new(Blank) as Box<dyn App>),
        }
    }

    /// Human-readable name; defaults to the id.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn app_type(mut self, app_type: AppType) -> Self {
        self.app_type = app_type;
        self
    }

    /// Overrides the per-type default flags.
    pub fn flags(mut self, flags: AppFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn single_instance(mut self, single: bool) -> Self {
        self.single_instance = single;
        self
    }

    /// Sets the instance factory; without one the app does nothing.
    pub fn factory<F, A>(mut self, factory: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
        A: App + 'static,
    {
        self.factory = Arc::new(move || Box::new(factory()) as Box<dyn App>);
        self
    }

    pub fn build(self) -> Manifest {
        let single_instance = self.single_instance || self.app_type == AppType::Desktop;
        Manifest {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            flags: self.flags.unwrap_or_else(|| AppFlags::for_type(self.app_type)),
            id: self.id,
            app_type: self.app_type,
            single_instance,
            factory: self.factory,
        }
    }
}
