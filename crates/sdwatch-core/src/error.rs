//! Error types for the browsing service

use thiserror::Error;

/// Result type alias for browsing operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors and reportable warnings produced while browsing
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A registration type string did not split into enough segments
    #[error("malformed registration type '{reg_type}': expected at least two '{separator}'-separated segments")]
    MalformedRegType { reg_type: String, separator: char },

    /// An instance event matched no known registration type summary
    #[error("instance event for unknown registration type '{service_name}' ({reg_type})")]
    UnknownSummaryKey {
        reg_type: String,
        service_name: String,
    },

    /// A subscription's bounded event buffer overflowed; the oldest events
    /// were dropped and the subscription stays open
    #[error("event buffer overflow on '{subscription}': {dropped} event(s) dropped so far")]
    BufferOverflow { subscription: String, dropped: u64 },

    /// Failed to open a browse for a service type
    #[error("failed to browse for '{reg_type}' in '{domain}': {reason}")]
    BrowseFailed {
        reg_type: String,
        domain: String,
        reason: String,
    },

    /// A second-level browse terminated abnormally; the subscription is
    /// gone but the session and its siblings keep running
    #[error("instance browse '{subscription}' terminated: {reason}")]
    SubscriptionLost { subscription: String, reason: String },

    /// The top-level registration type browse terminated; ends the session
    #[error("registration type browse terminated: {reason}")]
    Fatal { reason: String },

    /// Invalid browse configuration
    #[error("invalid browse configuration: {0}")]
    InvalidConfig(String),

    /// The aggregator is already running
    #[error("aggregator is already running")]
    AlreadyStarted,

    /// Backend (mDNS daemon) failure
    #[error("discovery backend error: {0}")]
    Backend(String),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// How severe an error is from the session's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Contained at the point of detection; the session keeps running
    Warning,
    /// Ends the session
    Fatal,
}

impl DiscoveryError {
    /// Classifies this error for consumers of the notification stream.
    ///
    /// Per-event problems (malformed input, unmatched instance events,
    /// buffer overflow) and failures of a single second-level browse are
    /// warnings; only top-level termination and setup problems are fatal.
    pub fn severity(&self) -> Severity {
        match self {
            DiscoveryError::MalformedRegType { .. }
            | DiscoveryError::UnknownSummaryKey { .. }
            | DiscoveryError::BufferOverflow { .. }
            | DiscoveryError::BrowseFailed { .. }
            | DiscoveryError::SubscriptionLost { .. } => Severity::Warning,
            DiscoveryError::Fatal { .. }
            | DiscoveryError::InvalidConfig(_)
            | DiscoveryError::AlreadyStarted
            | DiscoveryError::Backend(_)
            | DiscoveryError::Other(_) => Severity::Fatal,
        }
    }

    /// True if this error ends the session
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
