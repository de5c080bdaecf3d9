//! The aggregation pipeline
//!
//! [`TypeAggregator`] ties the pieces together: it opens the single
//! top-level browse on start, lazily opens one second-level browse per
//! distinct registration type, folds instance events into the summary
//! store, and publishes the visible snapshot after every change.
//!
//! Lifecycle is `Idle -> Discovering -> Stopped`: `start()` opens the
//! session, `stop()` tears everything down. There is no resume; the store
//! and registry are empty after a stop, so a later `start()` begins a
//! fresh session.

use crate::backend::{BrowseSession, ServiceBrowse};
use crate::forward::spawn_instance_forwarder;
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::store::SummaryStore;
use async_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use sdwatch_core::{
    decode_instance_type, decode_type_listing, BrowseConfig, DiscoveryError, Notification,
    Protocol, Result, ServiceEvent, SubscriptionKey, SummaryChange, SummaryKey, TypeSummary,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Message processed by the coordination task
#[derive(Debug)]
pub(crate) enum PipelineMsg {
    /// A registration type event from the top-level browse
    RegType(ServiceEvent),

    /// An instance event from any second-level browse
    Instance(ServiceEvent),

    /// A second-level browse terminated abnormally; contained per
    /// subscription, never fatal to siblings
    SubscriptionFailed {
        subscription: String,
        error: DiscoveryError,
    },

    /// The top-level browse ended; fatal to the session when unexpected
    TopLevelEnded(Option<DiscoveryError>),

    /// Orderly shutdown requested by `stop()`
    Shutdown,
}

/// State shared between the aggregator handle, the coordination task and
/// `stop()`
struct Inner {
    running: AtomicBool,
    store: Mutex<SummaryStore>,
    registry: SubscriptionRegistry,
    top_level: Mutex<Option<BrowseSession>>,
    notify: Sender<Notification>,
}

impl Inner {
    /// Tears the session down: cancels the top-level browse, every
    /// second-level subscription, and empties the store. Idempotent.
    fn halt(&self) {
        let session = self.top_level.lock().take();
        if let Some(mut session) = session {
            session.cancel();
        }
        self.registry.stop_all();
        self.store.lock().clear();
    }

    fn report(&self, error: DiscoveryError) {
        if self.notify.try_send(Notification::Error(error)).is_err() {
            debug!("notification channel saturated, error report dropped");
        }
    }
}

/// Hierarchical registration type aggregator
pub struct TypeAggregator {
    config: BrowseConfig,
    backend: Arc<dyn ServiceBrowse>,
    inner: Arc<Inner>,
    notify_rx: Receiver<Notification>,
    pipeline: Mutex<Option<Sender<PipelineMsg>>>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
    feeder: Mutex<Option<JoinHandle<()>>>,
}

impl TypeAggregator {
    /// Creates an aggregator over the given backend
    pub fn new(config: BrowseConfig, backend: Arc<dyn ServiceBrowse>) -> Result<Self> {
        config.validate().map_err(DiscoveryError::InvalidConfig)?;

        let (notify_tx, notify_rx) = async_channel::bounded(config.notify_capacity);

        Ok(Self {
            config,
            backend,
            inner: Arc::new(Inner {
                running: AtomicBool::new(false),
                store: Mutex::new(SummaryStore::new()),
                registry: SubscriptionRegistry::new(),
                top_level: Mutex::new(None),
                notify: notify_tx,
            }),
            notify_rx,
            pipeline: Mutex::new(None),
            coordinator: Mutex::new(None),
            feeder: Mutex::new(None),
        })
    }

    /// Opens the top-level browse and spawns the coordination task.
    /// Errors with [`DiscoveryError::AlreadyStarted`] while a session is
    /// running.
    pub fn start(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(DiscoveryError::AlreadyStarted);
        }

        info!(
            domain = %self.config.browse_domain,
            meta_query = %self.config.type_enumeration_domain,
            "starting registration type discovery"
        );

        let session = match self.backend.browse(
            &self.config.type_enumeration_domain,
            &self.config.browse_domain,
        ) {
            Ok(session) => session,
            Err(err) => {
                self.inner.running.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };
        let events = session.events();
        *self.inner.top_level.lock() = Some(session);

        let (pipe_tx, pipe_rx) = async_channel::bounded(self.config.event_buffer_capacity);

        // Top-level feeder: registration type events flow straight into the
        // bounded pipeline channel; an end of stream is fatal to the session
        // unless we are the ones stopping it.
        let pipeline = pipe_tx.clone();
        let feeder = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(Ok(event)) => {
                        if pipeline.send(PipelineMsg::RegType(event)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Err(error)) => {
                        let _ = pipeline.send(PipelineMsg::TopLevelEnded(Some(error))).await;
                        break;
                    }
                    Err(_) => {
                        let _ = pipeline.send(PipelineMsg::TopLevelEnded(None)).await;
                        break;
                    }
                }
            }
        });

        let coordinator = Coordinator {
            config: self.config.clone(),
            backend: self.backend.clone(),
            inner: self.inner.clone(),
            pipeline: pipe_tx.clone(),
            notify_rx: self.notify_rx.clone(),
            last_visible: 0,
        };
        let handle = tokio::spawn(coordinator.run(pipe_rx));

        *self.pipeline.lock() = Some(pipe_tx);
        *self.coordinator.lock() = Some(handle);
        *self.feeder.lock() = Some(feeder);
        Ok(())
    }

    /// Stops the session: cancels the top-level browse and every
    /// subscription, clears the store, and waits for the coordination task
    /// to finish. Idempotent.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("stopping registration type discovery");

        let pipeline = self.pipeline.lock().take();
        if let Some(tx) = pipeline {
            let _ = tx.send(PipelineMsg::Shutdown).await;
        }
        let coordinator = self.coordinator.lock().take();
        if let Some(handle) = coordinator {
            let _ = handle.await;
        }
        // Teardown comes after the join: a handler still running could
        // otherwise repopulate the registry or the store behind the clear.
        self.inner.halt();
        let feeder = self.feeder.lock().take();
        if let Some(handle) = feeder {
            handle.abort();
        }
    }

    /// Whether a session is currently discovering
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// The notification stream for the presentation boundary
    pub fn notifications(&self) -> Receiver<Notification> {
        self.notify_rx.clone()
    }

    /// Current visible summaries (count > 0), in store iteration order
    pub fn visible_summaries(&self) -> Vec<TypeSummary> {
        self.inner.store.lock().visible()
    }

    /// Total summary entries, visible or not
    pub fn summary_count(&self) -> usize {
        self.inner.store.lock().len()
    }

    /// Number of open second-level subscriptions
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }
}

/// The single event-path mutator of store and registry
struct Coordinator {
    config: BrowseConfig,
    backend: Arc<dyn ServiceBrowse>,
    inner: Arc<Inner>,
    pipeline: Sender<PipelineMsg>,
    notify_rx: Receiver<Notification>,
    last_visible: usize,
}

impl Coordinator {
    async fn run(mut self, rx: Receiver<PipelineMsg>) {
        while let Ok(msg) = rx.recv().await {
            match msg {
                PipelineMsg::Shutdown => break,
                PipelineMsg::TopLevelEnded(error) => {
                    self.session_ended(error);
                    break;
                }
                // Events still in flight after a stop are discarded
                _ if !self.inner.running.load(Ordering::SeqCst) => continue,
                PipelineMsg::RegType(event) => self.handle_reg_type(event),
                PipelineMsg::Instance(event) => self.handle_instance(event),
                PipelineMsg::SubscriptionFailed {
                    subscription,
                    error,
                } => {
                    warn!(subscription, error = %error, "instance browse failed");
                    self.inner.report(DiscoveryError::SubscriptionLost {
                        subscription,
                        reason: error.to_string(),
                    });
                }
            }
        }
        debug!("coordination task stopped");
    }

    /// One registration type event from the top-level browse.
    ///
    /// Withdrawals are ignored entirely: a registration type's summary and
    /// subscription live until the session stops (behavior inherited from
    /// the DNS-SD browsing model this reproduces).
    fn handle_reg_type(&self, event: ServiceEvent) {
        if event.lost {
            debug!(service = %event.service_name, "ignoring registration type withdrawal");
            return;
        }

        let separator = self.config.reg_type_separator;
        let (suffix, service_domain) = match decode_type_listing(&event.reg_type, separator) {
            Ok(parts) => parts,
            Err(err) => {
                warn!(reg_type = %event.reg_type, "dropping malformed registration type event");
                self.inner.report(err);
                return;
            }
        };

        let Some(protocol) = Protocol::from_suffix(suffix) else {
            warn!(
                suffix,
                service = %event.service_name,
                "unknown service protocol, ignoring registration type"
            );
            return;
        };

        let sub_key = SubscriptionKey::new(event.service_name.clone(), protocol);
        let browse_target = sub_key.browse_string();
        let service_domain = service_domain.to_string();
        match self.inner.registry.ensure(sub_key.clone(), || {
            self.open_instance_browse(&browse_target, &service_domain)
        }) {
            Ok(true) => {
                info!(subscription = %sub_key, domain = %service_domain, "opened instance browse")
            }
            Ok(false) => {}
            Err(err) => {
                warn!(subscription = %sub_key, error = %err, "could not open instance browse");
                self.inner.report(err);
            }
        }

        // Record the sighting; the count starts at zero and only instance
        // events move it.
        let key = SummaryKey::new(
            event.domain.clone(),
            event.reg_type.clone(),
            event.service_name.clone(),
        );
        self.inner
            .store
            .lock()
            .upsert(key, || TypeSummary::new(&event));
    }

    /// One instance event from any second-level browse.
    ///
    /// The summary key is rebuilt with swapped field roles relative to the
    /// top-level event: here the first reg type segment is the registration
    /// type name and the second is the protocol suffix, and the correlation
    /// domain is the configured empty domain.
    fn handle_instance(&mut self, event: ServiceEvent) {
        let separator = self.config.reg_type_separator;
        let (reg_type, suffix) = match decode_instance_type(&event.reg_type, separator) {
            Ok(parts) => parts,
            Err(err) => {
                warn!(reg_type = %event.reg_type, "dropping malformed instance event");
                self.inner.report(err);
                return;
            }
        };

        let key = SummaryKey::new(
            self.config.empty_domain.clone(),
            format!("{}{}{}", suffix, separator, event.domain),
            reg_type,
        );
        let delta = if event.lost { -1 } else { 1 };

        // Apply the mutation and take the snapshot under one lock so a
        // published view can never lag a newer mutation.
        let snapshot = {
            let mut store = self.inner.store.lock();
            store
                .adjust_count(&key, delta)
                .map(|_| store.visible())
        };

        match snapshot {
            Some(summaries) => self.publish(summaries),
            None => {
                warn!(
                    service = %key.service_name,
                    reg_type = %key.reg_type,
                    "instance event for unknown registration type"
                );
                self.inner.report(DiscoveryError::UnknownSummaryKey {
                    reg_type: key.reg_type,
                    service_name: key.service_name,
                });
            }
        }
    }

    fn open_instance_browse(&self, reg_type: &str, domain: &str) -> Result<Subscription> {
        let session = self.backend.browse(reg_type, domain)?;
        let forwarder = spawn_instance_forwarder(
            reg_type.to_string(),
            session.events(),
            self.pipeline.clone(),
            self.inner.notify.clone(),
            self.config.event_buffer_capacity,
        );
        Ok(Subscription::new(session, forwarder))
    }

    /// Publishes a snapshot, coalescing under saturation: when the channel
    /// is full the oldest queued notification is evicted so a slow consumer
    /// always wakes to the newest state rather than a stale one.
    fn publish(&mut self, summaries: Vec<TypeSummary>) {
        let change = SummaryChange {
            previous_visible: self.last_visible,
            summaries,
        };
        self.last_visible = change.summaries.len();

        let mut pending = Notification::SummaryChanged(change);
        loop {
            match self.inner.notify.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Closed(_)) => return,
                Err(TrySendError::Full(back)) => {
                    pending = back;
                    if self.notify_rx.try_recv().is_ok() {
                        debug!("notification channel saturated, evicted oldest notification");
                    }
                }
            }
        }
    }

    /// The top-level browse ended. If the session was still running this is
    /// fatal: report it and tear everything down.
    fn session_ended(&mut self, error: Option<DiscoveryError>) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let error = error.unwrap_or_else(|| DiscoveryError::Fatal {
            reason: "registration type browse ended unexpectedly".to_string(),
        });
        error!(error = %error, "registration type browse terminated, ending session");
        self.inner.report(error);
        self.inner.halt();
    }
}
