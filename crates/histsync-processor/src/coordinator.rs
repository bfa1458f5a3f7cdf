use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::trace;

/// Signal that another writer changed the shared log.
///
/// Carries no payload beyond a per-coordinator sequence number, which only
/// serves to correlate log lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteChange {
    pub sequence: u64,
}

/// Handle identifying one registered callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

type Callback = Arc<dyn Fn(&RemoteChange) + Send + Sync>;

/// Internal subscriber: an id paired with its callback.
struct Subscriber {
    id: SubscriptionId,
    callback: Callback,
}

#[derive(Default)]
struct Router {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    sequence: AtomicU64,
}

impl Router {
    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() < before
    }
}

/// Fan-out point for "the shared log changed" notifications.
///
/// Cloning is cheap; all clones share one subscriber list. Callbacks are
/// invoked synchronously on the notifying thread, outside the subscriber
/// lock, so a callback may subscribe or unsubscribe without deadlocking.
#[derive(Clone, Default)]
pub struct StoreCoordinator {
    router: Arc<Router>,
}

impl StoreCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. It stays registered until the returned
    /// [`Subscription`] is dropped or [`StoreCoordinator::unsubscribe`] is
    /// called with its id.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RemoteChange) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.router.next_id.fetch_add(1, Ordering::Relaxed));
        self.router
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                callback: Arc::new(callback),
            });
        trace!(%id, "coordinator subscribe");
        Subscription {
            id,
            router: Arc::downgrade(&self.router),
        }
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.router.unsubscribe(id)
    }

    /// Deliver a [`RemoteChange`] to every subscriber. Returns the number of
    /// callbacks invoked.
    pub fn notify_remote_change(&self) -> usize {
        let change = RemoteChange {
            sequence: self.router.sequence.fetch_add(1, Ordering::Relaxed),
        };
        let callbacks: Vec<Callback> = self
            .router
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| Arc::clone(&s.callback))
            .collect();

        trace!(sequence = change.sequence, subscribers = callbacks.len(), "remote change");
        for callback in &callbacks {
            callback(&change);
        }
        callbacks.len()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.router
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Registration guard returned by [`StoreCoordinator::subscribe`].
///
/// Dropping it unregisters the callback.
pub struct Subscription {
    id: SubscriptionId,
    router: Weak<Router>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(router) = self.router.upgrade() {
            router.unsubscribe(self.id);
        }
    }
}
