//! Active object abstraction.
//!
//! An active object owns one thread and one mailbox. Messages posted from any
//! thread are handed to its [`ActiveBehavior`] one at a time, on that thread
//! only, so the behavior's state needs no locking.

use crate::error::PutError;
use crate::kernel::{ThreadId, Ticks};
use crate::message_queue::MessageQueue;
use crate::thread::{Thread, ThreadConfig};

/// What the run loop does after a message has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Trait implemented by actor state.
pub trait ActiveBehavior: Send + 'static {
    type Message: Send + 'static;

    /// Runs on the actor thread before the first message.
    fn on_start(&mut self) {}

    fn on_message(&mut self, message: Self::Message) -> Flow;

    /// Runs on the actor thread after the loop has exited, before any
    /// leftover messages are dropped.
    fn on_exit(&mut self) {}
}

/// An actor thread together with its mailbox.
pub struct ActiveObject<M> {
    queue: MessageQueue<M>,
    thread: Thread,
}

impl<M: Send + 'static> ActiveObject<M> {
    /// Starts `behavior` on a new thread with a mailbox of `queue_capacity`.
    #[track_caller]
    pub fn spawn<B>(config: ThreadConfig, queue_capacity: usize, behavior: B) -> Self
    where
        B: ActiveBehavior<Message = M>,
    {
        let queue = MessageQueue::new(queue_capacity);
        let mailbox = queue.clone();
        let name = config.name.clone();
        let thread = Thread::spawn(config, move || run(name, mailbox, behavior));
        Self { queue, thread }
    }

    /// Posts a message, waiting at most `timeout` for room in the mailbox.
    pub fn post(&self, message: M, timeout: Ticks) -> Result<(), PutError<M>> {
        self.queue.put(message, timeout)
    }

    pub fn queue(&self) -> &MessageQueue<M> {
        &self.queue
    }

    /// Identity of the actor thread once it is running.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.thread.id()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the run loop to exit. Something must have made the behavior
    /// return [`Flow::Exit`] first.
    #[track_caller]
    pub fn join(&mut self) -> i32 {
        self.thread.join()
    }
}

fn run<B: ActiveBehavior>(name: String, mailbox: MessageQueue<B::Message>, mut behavior: B) -> i32 {
    behavior.on_start();
    loop {
        match mailbox.get(Ticks::FOREVER) {
            Ok(message) => {
                if behavior.on_message(message) == Flow::Exit {
                    break;
                }
            }
            Err(err) => crash!("actor '{name}' mailbox failed: {err}"),
        }
    }
    behavior.on_exit();

    let dropped = mailbox.reset();
    if dropped > 0 {
        log::warn!(target: "active", "actor '{name}' exited with {dropped} unprocessed message(s)");
    }
    log::debug!(target: "active", "actor '{name}' exited");
    0
}
