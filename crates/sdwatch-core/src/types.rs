//! Event and summary types

use crate::error::DiscoveryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One discovery event, emitted by either browse level.
///
/// For a top-level (type enumeration) browse, `reg_type` encodes
/// `<protocolSuffix>.<serviceDomain>` and `service_name` is the discovered
/// registration type. For a second-level browse, `reg_type` encodes
/// `<registrationType>.<protocolSuffix>` and `service_name` is a concrete
/// instance name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEvent {
    /// Domain the event was observed in
    pub domain: String,

    /// Compound registration type string
    pub reg_type: String,

    /// Discovered name (registration type or instance, by level)
    pub service_name: String,

    /// True when the service was withdrawn
    pub lost: bool,
}

impl ServiceEvent {
    /// A service-appeared event
    pub fn found(
        domain: impl Into<String>,
        reg_type: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            reg_type: reg_type.into(),
            service_name: service_name.into(),
            lost: false,
        }
    }

    /// A service-vanished event
    pub fn lost(
        domain: impl Into<String>,
        reg_type: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            lost: true,
            ..Self::found(domain, reg_type, service_name)
        }
    }
}

/// Aggregate record for one observed (domain, registration type) pair.
///
/// Owns a copy of the identity fields from the event that created it plus
/// the live instance count; it has no relationship to the wire-level event
/// type beyond that copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSummary {
    /// Domain the registration type was observed in
    pub domain: String,

    /// Compound registration type string as observed
    pub reg_type: String,

    /// Registration type name (e.g. `_http`)
    pub service_name: String,

    /// Live instance count; found events increment, lost events decrement.
    /// May go negative when lost events outrun found events; such entries
    /// simply stay out of the visible set.
    pub service_count: i64,

    /// When this registration type was first sighted
    pub discovered_at: DateTime<Utc>,
}

impl TypeSummary {
    /// Creates a summary from the registration type event that first
    /// sighted it; the count starts at zero
    pub fn new(event: &ServiceEvent) -> Self {
        Self {
            domain: event.domain.clone(),
            reg_type: event.reg_type.clone(),
            service_name: event.service_name.clone(),
            service_count: 0,
            discovered_at: Utc::now(),
        }
    }

    /// True if this entry belongs in the published view
    pub fn is_visible(&self) -> bool {
        self.service_count > 0
    }
}

/// Payload published to the presentation boundary after every visible
/// mutation
#[derive(Debug, Clone, Serialize)]
pub struct SummaryChange {
    /// How many entries were visible before this change; consumers use it
    /// e.g. to decide whether to show an empty-state placeholder
    pub previous_visible: usize,

    /// Current visible entries (count > 0), in store iteration order
    pub summaries: Vec<TypeSummary>,
}

/// Item delivered on the notification channel
#[derive(Debug)]
pub enum Notification {
    /// The visible summary set or a visible count changed
    SummaryChanged(SummaryChange),

    /// A reportable error or warning; check
    /// [`severity()`](DiscoveryError::severity) for whether the session
    /// survives it
    Error(DiscoveryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_copies_identity_and_starts_at_zero() {
        let event = ServiceEvent::found("local.", "_tcp.local.", "_http");
        let summary = TypeSummary::new(&event);
        assert_eq!(summary.domain, "local.");
        assert_eq!(summary.reg_type, "_tcp.local.");
        assert_eq!(summary.service_name, "_http");
        assert_eq!(summary.service_count, 0);
        assert!(!summary.is_visible());
    }

    #[test]
    fn visibility_threshold() {
        let event = ServiceEvent::found("", "_tcp.local.", "_ipp");
        let mut summary = TypeSummary::new(&event);
        summary.service_count = 1;
        assert!(summary.is_visible());
        summary.service_count = -1;
        assert!(!summary.is_visible());
    }

    #[test]
    fn lost_constructor_sets_flag() {
        let event = ServiceEvent::lost("local.", "_http._tcp.", "Printer");
        assert!(event.lost);
        assert_eq!(event.service_name, "Printer");
    }
}
