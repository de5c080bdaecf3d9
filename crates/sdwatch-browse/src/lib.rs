//! Hierarchical DNS-SD registration type aggregation
//!
//! A top-level browse enumerates registration types advertised on a domain.
//! Each distinct type observed lazily opens a second-level browse for its
//! concrete instances, and found/lost instance events are folded into a
//! live per-type count. Consumers receive a deduplicated, continuously
//! updated summary view over a notification channel.
//!
//! # Architecture
//!
//! - Every active browse (the top-level one and each second-level one) runs
//!   on its own task; second-level event streams pass through a bounded
//!   drop-oldest buffer.
//! - A single coordination task is the only event-path mutator of the
//!   summary store and subscription registry, so every event's effect on
//!   state is atomic with respect to other events and each published
//!   snapshot reflects the latest applied mutation.
//! - The network sits behind the [`ServiceBrowse`] trait; [`MdnsBrowse`]
//!   adapts the `mdns-sd` daemon, and tests drive the aggregator with an
//!   in-memory backend.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sdwatch_browse::{MdnsBrowse, TypeAggregator};
//! use sdwatch_core::{BrowseConfig, Notification};
//!
//! #[tokio::main]
//! async fn main() -> sdwatch_core::Result<()> {
//!     let backend = Arc::new(MdnsBrowse::new()?);
//!     let aggregator = TypeAggregator::new(BrowseConfig::default(), backend)?;
//!     let notifications = aggregator.notifications();
//!
//!     aggregator.start()?;
//!     while let Ok(notification) = notifications.recv().await {
//!         if let Notification::SummaryChanged(change) = notification {
//!             println!("{} visible registration types", change.summaries.len());
//!         }
//!     }
//!     aggregator.stop().await;
//!     Ok(())
//! }
//! ```

pub mod backend;
mod forward;
pub mod mdns;
pub mod registry;
pub mod service;
pub mod store;

pub use backend::{BrowseSession, EventStream, ServiceBrowse};
pub use mdns::MdnsBrowse;
pub use registry::{Subscription, SubscriptionRegistry};
pub use service::TypeAggregator;
pub use store::SummaryStore;
