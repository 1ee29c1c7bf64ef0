//! Lookup of installed app manifests.

use std::collections::BTreeMap;
use std::sync::Arc;

use rtsync::Mutex;

use crate::manifest::{AppType, Manifest};

/// Read access to installed apps, as the loader needs it.
pub trait AppRegistry: Send + Sync {
    fn find_by_id(&self, id: &str) -> Option<Arc<Manifest>>;

    fn for_each_of_type(&self, app_type: AppType, f: &mut dyn FnMut(&Arc<Manifest>));
}

/// In-memory manifest table keyed by app id.
///
/// Iteration callbacks run on a snapshot taken under the lock, so they may
/// call back into the registry.
#[derive(Debug, Default)]
pub struct ManifestRegistry {
    manifests: Mutex<BTreeMap<String, Arc<Manifest>>>,
}

impl ManifestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the manifest registered under its id.
    pub fn add(&self, manifest: Manifest) -> Arc<Manifest> {
        log::info!(target: "app_registry", "adding {}", manifest.id());
        let manifest = Arc::new(manifest);
        let previous = self
            .manifests
            .lock()
            .insert(manifest.id().to_owned(), manifest.clone());
        if previous.is_some() {
            log::warn!(target: "app_registry", "replaced existing manifest {}", manifest.id());
        }
        manifest
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Manifest>> {
        log::info!(target: "app_registry", "removing {id}");
        self.manifests.lock().remove(id)
    }

    /// Visits every manifest in id order.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Manifest>)) {
        for manifest in self.snapshot() {
            f(&manifest);
        }
    }

    pub fn len(&self) -> usize {
        self.manifests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.lock().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<Manifest>> {
        self.manifests.lock().values().cloned().collect()
    }
}

impl AppRegistry for ManifestRegistry {
    fn find_by_id(&self, id: &str) -> Option<Arc<Manifest>> {
        self.manifests.lock().get(id).cloned()
    }

    fn for_each_of_type(&self, app_type: AppType, f: &mut dyn FnMut(&Arc<Manifest>)) {
        for manifest in self.snapshot() {
            if manifest.app_type() == app_type {
                f(&manifest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ManifestRegistry {
        let registry = ManifestRegistry::new();
        registry.add(Manifest::builder("desktop").app_type(AppType::Desktop).build());
        registry.add(Manifest::builder("wifi").app_type(AppType::Settings).build());
        registry.add(Manifest::builder("display").app_type(AppType::Settings).build());
        registry.add(Manifest::builder("hello").build());
        registry
    }

    #[test]
    fn find_and_remove() {
        let registry = registry();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.find_by_id("wifi").unwrap().id(), "wifi");
        assert!(registry.find_by_id("nope").is_none());

        assert!(registry.remove("wifi").is_some());
        assert!(registry.find_by_id("wifi").is_none());
        assert!(registry.remove("wifi").is_none());
    }

    #[test]
    fn for_each_of_type_filters() {
        let registry = registry();
        let mut settings = Vec::new();
        registry.for_each_of_type(AppType::Settings, &mut |m| settings.push(m.id().to_owned()));
        assert_eq!(settings, vec!["display", "wifi"]);
    }

    #[test]
    fn callbacks_may_reenter_registry() {
        let registry = registry();
        let mut found = 0;
        registry.for_each(|manifest| {
            if registry.find_by_id(manifest.id()).is_some() {
                found += 1;
            }
        });
        assert_eq!(found, 4);
    }

    #[test]
    fn add_replaces_same_id() {
        let registry = ManifestRegistry::new();
        registry.add(Manifest::builder("app").name("Old").build());
        registry.add(Manifest::builder("app").name("New").build());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find_by_id("app").unwrap().name(), "New");
    }
}
