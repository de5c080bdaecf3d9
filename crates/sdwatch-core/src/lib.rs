//! Core types for DNS-SD registration type browsing
//!
//! This crate holds the pieces shared between the aggregation service and
//! its consumers:
//! - The event shape emitted by both browse levels ([`ServiceEvent`])
//! - The per-type summary record and change notifications ([`TypeSummary`],
//!   [`Notification`])
//! - The two composite key spaces and the reg-type decoders ([`keys`])
//! - Browse configuration with validation ([`BrowseConfig`])
//! - The error taxonomy with severity classification ([`DiscoveryError`])
//!
//! Nothing here touches the network; the actual browsing lives behind the
//! backend seam in `sdwatch-browse`.

pub mod config;
pub mod error;
pub mod keys;
pub mod types;

pub use config::BrowseConfig;
pub use error::{DiscoveryError, Result, Severity};
pub use keys::{
    decode_instance_type, decode_type_listing, Protocol, SubscriptionKey, SummaryKey,
};
pub use types::{Notification, ServiceEvent, SummaryChange, TypeSummary};
