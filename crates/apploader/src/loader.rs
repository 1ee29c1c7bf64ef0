//! The loader service: one actor thread owning the app stack.
//!
//! Every request, from any thread, becomes a [`LoaderMessage`] on the
//! loader's queue. Only the loader thread touches the stack, so the stack
//! needs no lock. Other threads observe it through the atomically published
//! [`AppSnapshot`] and through lifecycle events on [`Loader::pubsub`].

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use appkit::{AppRegistry, AppState, Bundle, Display, LaunchId};
use arc_swap::ArcSwapOption;
use once_cell::sync::OnceCell;
use rtsync::kernel;
use rtsync::{
    alloc_locked, ActiveBehavior, ActiveObject, Flow, MessageQueue, Mutex, PubSub, ThreadId, Ticks,
};

use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::event::{AppSnapshot, LoaderEvent};
use crate::lifecycle::Stage;
use crate::message::LoaderMessage;
use crate::stack::{AppStack, StackEntry};

/// State shared between the loader handle and its thread.
struct Shared {
    pubsub: PubSub<LoaderEvent>,
    current: ArcSwapOption<AppSnapshot>,
    depth: AtomicUsize,
    thread_id: OnceCell<ThreadId>,
}

/// Handle to a running loader.
pub struct Loader {
    config: LoaderConfig,
    queue: MessageQueue<LoaderMessage>,
    actor: Mutex<Option<ActiveObject<LoaderMessage>>>,
    running: AtomicBool,
    joined: AtomicBool,
    shared: Arc<Shared>,
}

impl Loader {
    /// Spawns the loader thread and, if configured, starts the root app.
    pub fn spawn(
        config: LoaderConfig,
        registry: Arc<dyn AppRegistry>,
        display: Arc<Display>,
    ) -> LoaderResult<Self> {
        config.validate()?;
        let shared = Arc::new(Shared {
            pubsub: PubSub::new(),
            current: ArcSwapOption::empty(),
            depth: AtomicUsize::new(0),
            thread_id: OnceCell::new(),
        });

        let actor = ActiveObject::spawn(
            config.thread.clone(),
            config.queue_capacity,
            LoaderActor {
                registry,
                display,
                stack: AppStack::new(config.stack_limit),
                next_launch: 1,
                display_timeout: config.display_timeout,
                shared: shared.clone(),
            },
        );
        log::info!(target: "loader", "started");

        let loader = Self {
            queue: actor.queue().clone(),
            actor: Mutex::new(Some(actor)),
            running: AtomicBool::new(true),
            joined: AtomicBool::new(false),
            shared,
            config,
        };

        if let Some(root) = loader.config.root_app.clone() {
            if let Err(err) = loader.start(&root, Bundle::new()) {
                log::error!(target: "loader", "failed to start root app \"{root}\": {err}");
                loader.shutdown()?;
                return Err(err);
            }
        }
        Ok(loader)
    }

    /// Starts app `id` and waits until it is showing.
    pub fn start(&self, id: &str, bundle: Bundle) -> LoaderResult<LaunchId> {
        self.ensure_blocking_allowed()?;
        let (lock, reply) = alloc_locked();
        self.post(LoaderMessage::AppStart {
            id: id.to_owned(),
            bundle,
            reply: Some(reply),
        })?;
        lock.wait_and_free(self.config.reply_timeout)?
    }

    /// Queues a start of app `id` without waiting. Only queueing failures are
    /// reported; start failures are logged by the loader.
    pub fn start_detached(&self, id: &str, bundle: Bundle) -> LoaderResult<()> {
        self.post(LoaderMessage::AppStart {
            id: id.to_owned(),
            bundle,
            reply: None,
        })
    }

    /// Stops the top app, resumes the one below it and waits until done.
    pub fn stop(&self) -> LoaderResult<()> {
        self.ensure_blocking_allowed()?;
        let (lock, reply) = alloc_locked();
        self.post(LoaderMessage::AppStop { reply: Some(reply) })?;
        lock.wait_and_free(self.config.reply_timeout)?
    }

    /// Queues a stop of the top app without waiting.
    pub fn stop_detached(&self) -> LoaderResult<()> {
        self.post(LoaderMessage::AppStop { reply: None })
    }

    /// The app currently on top of the stack.
    pub fn current_app(&self) -> Option<Arc<AppSnapshot>> {
        self.shared.current.load_full()
    }

    pub fn stack_depth(&self) -> usize {
        self.shared.depth.load(Ordering::Acquire)
    }

    /// Lifecycle events. Subscriptions must be released before the loader is
    /// dropped.
    pub fn pubsub(&self) -> &PubSub<LoaderEvent> {
        &self.shared.pubsub
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Stops the loader thread after the request it is processing, then
    /// stops every app left on the stack, top first.
    pub fn shutdown(&self) -> LoaderResult<()> {
        if self.on_loader_thread() {
            return Err(LoaderError::CalledFromLoaderThread);
        }
        let mut actor = self.actor.lock().take().ok_or(LoaderError::NotRunning)?;
        self.running.store(false, Ordering::Release);

        if let Err(err) = actor.post(LoaderMessage::ServiceStop, Ticks::FOREVER) {
            log::error!(target: "loader", "failed to queue service stop: {err}");
            return Err(LoaderError::Sync(err.error));
        }
        actor.join();
        self.joined.store(true, Ordering::Release);
        let stragglers = self.queue.reset();
        if stragglers > 0 {
            log::warn!(target: "loader", "dropped {stragglers} request(s) queued during shutdown");
        }
        log::info!(target: "loader", "stopped");
        Ok(())
    }

    fn post(&self, message: LoaderMessage) -> LoaderResult<()> {
        if !self.is_running() {
            return Err(LoaderError::NotRunning);
        }
        // The loader thread would wait on its own queue.
        let timeout = if self.on_loader_thread() {
            Ticks::ZERO
        } else {
            self.config.enqueue_timeout
        };
        self.queue.put(message, timeout).map_err(|err| {
            log::error!(
                target: "loader",
                "failed to queue {} request: {}",
                err.message.kind(),
                err.error
            );
            LoaderError::Sync(err.error)
        })?;
        // Raced with shutdown: the loader thread will never read it. Dropping
        // it releases any waiter with `Disconnected`.
        if self.joined.load(Ordering::Acquire) {
            self.queue.reset();
        }
        Ok(())
    }

    fn ensure_blocking_allowed(&self) -> LoaderResult<()> {
        if self.on_loader_thread() {
            log::error!(target: "loader", "blocking request from the loader thread");
            return Err(LoaderError::CalledFromLoaderThread);
        }
        Ok(())
    }

    /// True when called from the loader thread, e.g. from an app callback.
    pub fn on_loader_thread(&self) -> bool {
        self.shared.thread_id.get() == Some(&kernel::current_thread_id())
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        if self.actor.get_mut().is_none() {
            return;
        }
        if self.on_loader_thread() {
            // The thread cannot join itself; it stays parked on its queue.
            log::error!(
                target: "loader",
                "last loader handle dropped on the loader thread, loader thread leaked"
            );
            return;
        }
        if let Err(err) = self.shutdown() {
            log::error!(target: "loader", "shutdown on drop failed: {err}");
        }
    }
}

/// Loader thread state.
struct LoaderActor {
    registry: Arc<dyn AppRegistry>,
    display: Arc<Display>,
    stack: AppStack,
    next_launch: u32,
    display_timeout: Ticks,
    shared: Arc<Shared>,
}

impl LoaderActor {
    fn start(&mut self, id: &str, bundle: Bundle) -> LoaderResult<LaunchId> {
        log::info!(target: "loader", "start by id {id}");

        let manifest = self
            .registry
            .find_by_id(id)
            .ok_or_else(|| LoaderError::UnknownApp(id.to_owned()))?;
        if manifest.single_instance() && self.stack.contains(id) {
            return Err(LoaderError::AppAlreadyStarted(id.to_owned()));
        }
        if self.stack.is_full() {
            return Err(LoaderError::StackFull(self.stack.limit()));
        }

        let launch_id = LaunchId(self.next_launch);
        self.next_launch = self.next_launch.wrapping_add(1);
        let is_root = self.stack.is_empty();
        let entry = StackEntry::new(manifest, bundle, launch_id, is_root);
        if self.stack.push(entry).is_err() {
            return Err(LoaderError::StackFull(self.stack.limit()));
        }

        let stage = Stage {
            display: &self.display,
            pubsub: &self.shared.pubsub,
            display_timeout: self.display_timeout,
        };
        let index = self.stack.len() - 1;
        if let Some(entry) = self.stack.get_mut(index) {
            stage.transition(entry, AppState::Started);
        }
        // The new app takes over the screen; the previous one is parked.
        if index > 0 {
            if let Some(previous) = self.stack.get_mut(index - 1) {
                stage.transition(previous, AppState::Hiding);
            }
        }
        let mut started = None;
        if let Some(entry) = self.stack.get_mut(index) {
            stage.transition(entry, AppState::Showing);
            started = Some(entry.info());
        }

        if let Some(info) = started {
            self.shared.pubsub.publish(&LoaderEvent::Started(info));
        }
        Ok(launch_id)
    }

    fn stop(&mut self) -> LoaderResult<()> {
        let stage = Stage {
            display: &self.display,
            pubsub: &self.shared.pubsub,
            display_timeout: self.display_timeout,
        };

        let top = self.stack.top_mut().ok_or(LoaderError::NoAppRunning)?;
        if top.is_root {
            return Err(LoaderError::CannotStopRoot);
        }
        stage.transition(top, AppState::Hiding);
        stage.transition(top, AppState::Stopped);
        let info = top.info();

        // Dropping the entry frees the instance.
        drop(self.stack.pop());

        if let Some(resumed) = self.stack.top_mut() {
            stage.transition(resumed, AppState::Showing);
        }
        self.shared.pubsub.publish(&LoaderEvent::Stopped(info));
        Ok(())
    }

    /// Stops everything still on the stack, top first.
    fn teardown(&mut self) {
        let stage = Stage {
            display: &self.display,
            pubsub: &self.shared.pubsub,
            display_timeout: self.display_timeout,
        };
        let mut stopped = Vec::new();
        while let Some(mut entry) = self.stack.pop() {
            if entry.state == AppState::Showing {
                stage.transition(&mut entry, AppState::Hiding);
            }
            stage.transition(&mut entry, AppState::Stopped);
            stopped.push(entry.info());
            drop(entry);
        }
        for info in stopped {
            stage.pubsub.publish(&LoaderEvent::Stopped(info));
        }
    }

    fn publish_snapshot(&self) {
        let snapshot = self.stack.snapshot().map(Arc::new);
        self.shared.current.store(snapshot);
        self.shared.depth.store(self.stack.len(), Ordering::Release);
    }
}

impl ActiveBehavior for LoaderActor {
    type Message = LoaderMessage;

    fn on_start(&mut self) {
        // Set exactly once, before any request is processed.
        let _ = self.shared.thread_id.set(kernel::current_thread_id());
    }

    fn on_message(&mut self, message: LoaderMessage) -> Flow {
        log::debug!(target: "loader", "processing {} request", message.kind());
        match message {
            LoaderMessage::AppStart { id, bundle, reply } => {
                let result = self.start(&id, bundle);
                if let Err(err) = &result {
                    log::error!(target: "loader", "failed to start app \"{id}\": {err}");
                }
                self.publish_snapshot();
                if let Some(reply) = reply {
                    reply.signal(result);
                }
                Flow::Continue
            }
            LoaderMessage::AppStop { reply } => {
                let result = self.stop();
                if let Err(err) = &result {
                    log::error!(target: "loader", "stop app: {err}");
                }
                self.publish_snapshot();
                if let Some(reply) = reply {
                    reply.signal(result);
                }
                Flow::Continue
            }
            LoaderMessage::ServiceStop => Flow::Exit,
        }
    }

    fn on_exit(&mut self) {
        if !self.stack.is_empty() {
            log::info!(target: "loader", "stopping {} app(s) on exit", self.stack.len());
        }
        self.teardown();
        self.publish_snapshot();
    }
}
