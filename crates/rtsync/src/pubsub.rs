//! Publish/subscribe registry.
//!
//! Subscribers register a callback and get back a [`Subscription`] handle.
//! [`PubSub::publish`] invokes every callback synchronously, in subscription
//! order, on the publishing thread, with the registry lock held for the whole
//! fan-out. Two publishes therefore never interleave.
//!
//! A callback must not call back into the same registry. The registry lock is
//! non-reentrant, so doing so is caught as a fatal error instead of
//! deadlocking.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::mutex::Mutex;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

type Callback<M> = Box<dyn FnMut(&M) + Send>;

struct Subscriber<M> {
    id: u64,
    callback: Callback<M>,
}

/// Handle binding a callback to a [`PubSub`].
///
/// Identifiers are unique across all registries. The handle is consumed by
/// [`PubSub::unsubscribe`], so it cannot be used twice.
#[must_use = "a subscription must be handed back to `unsubscribe`"]
#[derive(PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscription({})", self.id)
    }
}

/// Thread-safe fan-out of `M` messages to registered callbacks.
pub struct PubSub<M> {
    subscribers: Mutex<Vec<Subscriber<M>>>,
}

impl<M> PubSub<M> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers `callback`; it receives every message published from now on
    /// until the returned handle is unsubscribed.
    #[track_caller]
    pub fn subscribe(&self, callback: impl FnMut(&M) + Send + 'static) -> Subscription {
        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push(Subscriber {
            id,
            callback: Box::new(callback),
        });
        log::trace!(target: "pubsub", "subscribed #{id}");
        Subscription { id }
    }

    /// Removes a subscription. A handle that does not belong to this registry
    /// is fatal.
    #[track_caller]
    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self.subscribers.lock();
        match subscribers.iter().position(|s| s.id == subscription.id) {
            Some(index) => {
                // Keeps the remaining subscribers in subscription order.
                subscribers.remove(index);
                log::trace!(target: "pubsub", "unsubscribed #{}", subscription.id);
            }
            None => crash!("unsubscribe of unknown subscription #{}", subscription.id),
        }
    }

    /// Delivers `message` to every subscriber, in subscription order.
    #[track_caller]
    pub fn publish(&self, message: &M) {
        let mut subscribers = self.subscribers.lock();
        for subscriber in subscribers.iter_mut() {
            (subscriber.callback)(message);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<M> Default for PubSub<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Drop for PubSub<M> {
    fn drop(&mut self) {
        let remaining = self.subscribers.get_mut().len();
        // Skipped while unwinding, where a second panic would abort.
        if !std::thread::panicking() {
            check!(
                remaining == 0,
                "pubsub destroyed with {remaining} live subscription(s)"
            );
        }
    }
}

impl<M> fmt::Debug for PubSub<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn publish_reaches_subscribers_in_order() {
        let pubsub = PubSub::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let first = {
            let seen = seen.clone();
            pubsub.subscribe(move |m: &u32| seen.lock().unwrap().push(("first", *m)))
        };
        let second = {
            let seen = seen.clone();
            pubsub.subscribe(move |m: &u32| seen.lock().unwrap().push(("second", *m)))
        };

        pubsub.publish(&1);
        pubsub.unsubscribe(first);
        pubsub.publish(&2);
        pubsub.unsubscribe(second);
        pubsub.publish(&3);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("second", 2)]
        );
        assert_eq!(pubsub.subscriber_count(), 0);
    }

    #[test]
    fn subscription_ids_are_unique_across_instances() {
        let a = PubSub::<()>::new();
        let b = PubSub::<()>::new();
        let sa = a.subscribe(|_| {});
        let sb = b.subscribe(|_| {});
        assert_ne!(sa.id(), sb.id());
        a.unsubscribe(sa);
        b.unsubscribe(sb);
    }

    #[test]
    #[should_panic(expected = "unknown subscription")]
    fn foreign_handle_is_fatal() {
        let a = PubSub::<()>::new();
        let b = PubSub::<()>::new();
        let handle = a.subscribe(|_| {});
        b.unsubscribe(handle);
    }

    #[test]
    #[should_panic(expected = "live subscription")]
    fn dropping_with_subscribers_is_fatal() {
        let pubsub = PubSub::<()>::new();
        let _handle = pubsub.subscribe(|_| {});
        drop(pubsub);
    }

    #[test]
    #[should_panic(expected = "re-acquired by its owner")]
    fn reentrant_publish_is_fatal() {
        let pubsub = Arc::new(PubSub::<u8>::new());
        let inner = pubsub.clone();
        let _handle = pubsub.subscribe(move |m| {
            if *m == 0 {
                inner.publish(&1);
            }
        });
        pubsub.publish(&0);
    }
}
