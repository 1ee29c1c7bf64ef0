//! A small desktop session driven through the loader.
//!
//! A desktop root app, a GUI service that redraws the status bar on every
//! lifecycle event, and two apps started and stopped from a worker thread.

use std::sync::Arc;

use appkit::{App, AppContext, AppType, Bundle, Display, Manifest, ManifestRegistry, Surface};
use apploader::{service, LoaderConfig, LoaderEvent};
use rtsync::Ticks;

struct Desktop;

impl App for Desktop {
    fn on_show(&mut self, _ctx: &mut AppContext, surface: &mut Surface) {
        surface.set_title("Desktop");
        surface.add_label("Files");
        surface.add_label("Settings");
    }
}

struct Files {
    opened: String,
}

impl App for Files {
    fn on_start(&mut self, ctx: &mut AppContext) {
        if let Some(path) = ctx.parameters().get_string("path") {
            self.opened = path.to_owned();
        }
    }

    fn on_show(&mut self, _ctx: &mut AppContext, surface: &mut Surface) {
        surface.set_title("Files");
        surface.add_label(format!("browsing {}", self.opened));
    }

    fn on_stop(&mut self, _ctx: &mut AppContext) {
        println!("   files: closing {}", self.opened);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== desktop session ===\n");

    let registry = Arc::new(ManifestRegistry::new());
    registry.add(
        Manifest::builder("desktop")
            .name("Desktop")
            .app_type(AppType::Desktop)
            .factory(|| Desktop)
            .build(),
    );
    registry.add(
        Manifest::builder("files")
            .name("Files")
            .factory(|| Files {
                opened: "/".to_owned(),
            })
            .build(),
    );
    registry.add(
        Manifest::builder("settings")
            .name("Settings")
            .app_type(AppType::Settings)
            .single_instance(true)
            .build(),
    );

    let display = Arc::new(Display::new());
    let config = LoaderConfig::builder().root_app("desktop").build();
    let loader = match service::init(config, registry, display.clone()) {
        Ok(loader) => loader,
        Err(err) => {
            eprintln!("loader failed to start: {err}");
            return;
        }
    };

    // GUI service: redraws the status bar while the loader holds the display.
    let gui = {
        let display = display.clone();
        loader.pubsub().subscribe(move |event| {
            println!("   event: {event:?}");
            if let LoaderEvent::Showing(info) = event {
                let _ = display.with_surface(Ticks::ZERO, |surface| {
                    surface.set_statusbar_text(format!("{} | 12:00", info.name));
                });
            }
        })
    };

    let worker = {
        let loader = loader.clone();
        std::thread::spawn(move || {
            let mut bundle = Bundle::new();
            bundle.put_string("path", "/sdcard/music");
            let launch = loader.start("files", bundle);
            println!("1. start files -> {launch:?}");
            println!("2. start settings -> {:?}", loader.start("settings", Bundle::new()));
            println!("3. start settings again -> {:?}", loader.start("settings", Bundle::new()));
            println!("4. stop -> {:?}", loader.stop());
        })
    };
    if worker.join().is_err() {
        eprintln!("worker panicked");
    }

    if let Some(current) = loader.current_app() {
        println!("\ncurrent app: {} ({}), depth {}", current.info, current.state, current.depth);
    }
    if let Ok(surface) = display.snapshot(Ticks::FOREVER) {
        println!("screen: {:?} {:?}", surface.title(), surface.labels());
        println!("status: {:?}", surface.statusbar_text());
    }
    println!("stop root -> {:?}\n", loader.stop());

    loader.pubsub().unsubscribe(gui);
    if let Err(err) = service::shutdown() {
        eprintln!("shutdown failed: {err}");
    }
}
