//! Seam between the aggregator and the discovery primitive
//!
//! The aggregator only ever talks to [`ServiceBrowse`]; the production
//! implementation lives in [`crate::mdns`], tests substitute an in-memory
//! one.

use async_channel::Receiver;
use sdwatch_core::{DiscoveryError, Result, ServiceEvent};

/// Stream of events from one browse. An `Err` item means the browse
/// terminated abnormally; a closed channel means it ended.
pub type EventStream = Receiver<std::result::Result<ServiceEvent, DiscoveryError>>;

/// The low-level discovery primitive.
///
/// Implementations must tolerate many concurrent sessions for different
/// `(reg_type, domain)` pairs and support independent cancellation per
/// session.
pub trait ServiceBrowse: Send + Sync + 'static {
    /// Opens a browse for `reg_type` in `domain` and returns the session
    /// delivering its events
    fn browse(&self, reg_type: &str, domain: &str) -> Result<BrowseSession>;
}

/// A cancellable handle to one running browse
pub struct BrowseSession {
    events: EventStream,
    canceller: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl BrowseSession {
    pub fn new(events: EventStream, canceller: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            events,
            canceller: Some(Box::new(canceller)),
        }
    }

    /// The event stream of this browse
    pub fn events(&self) -> EventStream {
        self.events.clone()
    }

    /// Cancels the browse. Idempotent: cancelling an already-cancelled or
    /// already-terminated browse is a no-op.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.canceller.take() {
            cancel();
        }
    }
}

impl Drop for BrowseSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for BrowseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowseSession")
            .field("cancelled", &self.canceller.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Sessions end up inside state shared across tasks, so they must stay
    // shareable even though the canceller is a boxed closure.
    #[test]
    fn sessions_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BrowseSession>();
    }

    #[test]
    fn cancel_is_idempotent() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let counter = cancelled.clone();
        let (_tx, rx) = async_channel::bounded(1);
        let mut session = BrowseSession::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        session.cancel();
        session.cancel();
        drop(session);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_cancels_once() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let counter = cancelled.clone();
        let (_tx, rx) = async_channel::bounded(1);
        let session = BrowseSession::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        drop(session);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }
}
