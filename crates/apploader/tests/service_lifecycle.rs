//! The process-wide loader handle.
//!
//! Kept to a single test: the handle is global to the test binary.

use std::sync::{Arc, Mutex as StdMutex};

use appkit::{App, AppContext, AppType, Bundle, Display, Manifest, ManifestRegistry};
use apploader::{service, LoaderConfig, LoaderError, LoaderResult};

type Outcome = Arc<StdMutex<Option<LoaderResult<()>>>>;

/// Asks the service to shut down from its own start callback.
struct PowerOff {
    outcome: Outcome,
}

impl App for PowerOff {
    fn on_start(&mut self, _ctx: &mut AppContext) {
        *self.outcome.lock().unwrap() = Some(service::shutdown());
    }
}

fn registry() -> Arc<ManifestRegistry> {
    registry_with(&Outcome::default())
}

fn registry_with(outcome: &Outcome) -> Arc<ManifestRegistry> {
    let registry = Arc::new(ManifestRegistry::new());
    registry.add(Manifest::builder("desktop").app_type(AppType::Desktop).build());
    registry.add(Manifest::builder("notes").build());
    let outcome = outcome.clone();
    registry.add(
        Manifest::builder("poweroff")
            .factory(move || PowerOff {
                outcome: outcome.clone(),
            })
            .build(),
    );
    registry
}

#[test]
fn init_instance_shutdown() {
    let _ = env_logger::builder().is_test(true).try_init();

    assert!(service::instance().is_none());
    assert_eq!(service::shutdown().err(), Some(LoaderError::NotRunning));

    let config = LoaderConfig::builder().root_app("desktop").build();
    let loader = service::init(config, registry(), Arc::new(Display::new())).unwrap();
    assert_eq!(loader.stack_depth(), 1);

    let again = service::init(LoaderConfig::default(), registry(), Arc::new(Display::new()));
    assert_eq!(again.err(), Some(LoaderError::AlreadyRunning));

    let instance = service::instance().unwrap();
    assert!(Arc::ptr_eq(&instance, &loader));
    instance.start("notes", Bundle::new()).unwrap();
    assert_eq!(loader.current_app().unwrap().info.id, "notes");
    drop(instance);

    service::shutdown().unwrap();
    assert!(service::instance().is_none());
    assert!(!loader.is_running());
    assert_eq!(loader.stack_depth(), 0);

    // A fresh instance can be started after shutdown.
    let outcome = Outcome::default();
    let loader =
        service::init(LoaderConfig::default(), registry_with(&outcome), Arc::new(Display::new()))
            .unwrap();
    loader.start("notes", Bundle::new()).unwrap();

    // An app cannot stop the service from its own callback, and the handle
    // survives the attempt.
    loader.start("poweroff", Bundle::new()).unwrap();
    assert_eq!(
        outcome.lock().unwrap().take(),
        Some(Err(LoaderError::CalledFromLoaderThread))
    );
    assert!(loader.is_running());
    let instance = service::instance().unwrap();
    assert!(Arc::ptr_eq(&instance, &loader));
    drop(instance);

    service::shutdown().unwrap();
    assert!(service::instance().is_none());
    assert!(!loader.is_running());
    assert_eq!(service::shutdown(), Err(LoaderError::NotRunning));
}
