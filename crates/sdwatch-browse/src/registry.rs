//! Lifetimes of second-level browse subscriptions
//!
//! One subscription per distinct `serviceName.protocolSuffix` key: created
//! lazily on first sighting, never restarted on failure, all torn down
//! together on session stop.

use crate::backend::BrowseSession;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sdwatch_core::{Result, SubscriptionKey};
use tokio::task::JoinHandle;
use tracing::debug;

/// One running second-level browse: the backend session plus the forwarder
/// task feeding its events into the pipeline
pub struct Subscription {
    session: BrowseSession,
    forwarder: JoinHandle<()>,
}

impl Subscription {
    pub fn new(session: BrowseSession, forwarder: JoinHandle<()>) -> Self {
        Self { session, forwarder }
    }

    /// Cancels the browse and aborts its forwarder. Safe on an already
    /// terminated subscription.
    fn shutdown(mut self) {
        self.session.cancel();
        self.forwarder.abort();
    }
}

/// Registry of open subscriptions, keyed by `(service_name, protocol)`
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: DashMap<SubscriptionKey, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a subscription under `key` unless one is already registered.
    /// Returns `true` when `start` was invoked and its subscription
    /// registered, `false` on the duplicate-sighting no-op. A failing
    /// `start` leaves no entry behind, so a later sighting may retry.
    pub fn ensure<F>(&self, key: SubscriptionKey, start: F) -> Result<bool>
    where
        F: FnOnce() -> Result<Subscription>,
    {
        match self.subscriptions.entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(start()?);
                Ok(true)
            }
        }
    }

    /// Cancels every registered subscription and clears the registry.
    /// Idempotent; cancelling already-finished subscriptions is a no-op.
    pub fn stop_all(&self) {
        let keys: Vec<SubscriptionKey> = self
            .subscriptions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for key in keys {
            if let Some((_, subscription)) = self.subscriptions.remove(&key) {
                debug!(subscription = %key, "cancelling instance browse");
                subscription.shutdown();
            }
        }
    }

    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.subscriptions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
