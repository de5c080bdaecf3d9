//! Composite keys and registration type decoding
//!
//! Two distinct key spaces exist and must not be conflated:
//! - [`SummaryKey`] identifies a summary entry in the store and is built
//!   from `(domain, reg_type, service_name)`;
//! - [`SubscriptionKey`] identifies an open second-level browse and is
//!   built from `(service_name, protocol)`.
//!
//! Both are structured values compared field by field, so differently
//! segmented inputs can never collide the way concatenated strings would.
//!
//! The compound `reg_type` string is decoded differently depending on which
//! browse level produced it, hence two named decoders instead of one
//! positional splitter: a type-enumeration event carries
//! `<protocolSuffix>.<serviceDomain>` while an instance event carries
//! `<registrationType>.<protocolSuffix>`.

use crate::config::{TCP_REG_TYPE_SUFFIX, UDP_REG_TYPE_SUFFIX};
use crate::error::DiscoveryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport protocol of a registration type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Parses a protocol suffix; anything other than the two recognized
    /// suffixes yields `None` and the registration type is skipped for
    /// subscription purposes
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            TCP_REG_TYPE_SUFFIX => Some(Protocol::Tcp),
            UDP_REG_TYPE_SUFFIX => Some(Protocol::Udp),
            _ => None,
        }
    }

    /// The wire suffix for this protocol
    pub fn suffix(&self) -> &'static str {
        match self {
            Protocol::Tcp => TCP_REG_TYPE_SUFFIX,
            Protocol::Udp => UDP_REG_TYPE_SUFFIX,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Key of a summary entry in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummaryKey {
    pub domain: String,
    pub reg_type: String,
    pub service_name: String,
}

impl SummaryKey {
    pub fn new(
        domain: impl Into<String>,
        reg_type: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            reg_type: reg_type.into(),
            service_name: service_name.into(),
        }
    }
}

/// Key of an open second-level browse subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub service_name: String,
    pub protocol: Protocol,
}

impl SubscriptionKey {
    pub fn new(service_name: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            service_name: service_name.into(),
            protocol,
        }
    }

    /// The registration type string handed to the second-level browse,
    /// e.g. `_printer._tcp`
    pub fn browse_string(&self) -> String {
        format!("{}.{}", self.service_name, self.protocol.suffix())
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service_name, self.protocol.suffix())
    }
}

/// Decodes the compound reg type of a top-level registration type event
/// into `(protocol_suffix, service_domain)`.
pub fn decode_type_listing(
    full_reg_type: &str,
    separator: char,
) -> Result<(&str, &str), DiscoveryError> {
    split_two(full_reg_type, separator)
}

/// Decodes the compound reg type of a second-level instance event into
/// `(registration_type, protocol_suffix)`. Note the swapped field roles
/// relative to [`decode_type_listing`].
pub fn decode_instance_type(
    full_reg_type: &str,
    separator: char,
) -> Result<(&str, &str), DiscoveryError> {
    split_two(full_reg_type, separator)
}

/// Splits off the first two segments, tolerating a trailing separator
/// (`"_tcp.local."` has segments `_tcp` and `local`).
fn split_two(full_reg_type: &str, separator: char) -> Result<(&str, &str), DiscoveryError> {
    let mut parts = full_reg_type.split(separator);
    let first = parts.next().filter(|s| !s.is_empty());
    let second = parts.next().filter(|s| !s.is_empty());
    match (first, second) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(DiscoveryError::MalformedRegType {
            reg_type: full_reg_type.to_string(),
            separator,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_type_listing() {
        let (suffix, domain) = decode_type_listing("_tcp.local.", '.').unwrap();
        assert_eq!(suffix, "_tcp");
        assert_eq!(domain, "local");
    }

    #[test]
    fn decodes_instance_type() {
        let (reg_type, suffix) = decode_instance_type("_http._tcp.", '.').unwrap();
        assert_eq!(reg_type, "_http");
        assert_eq!(suffix, "_tcp");
    }

    #[test]
    fn extra_segments_ignored() {
        // Only the first two segments matter, the rest is carried verbatim
        // in the summary key's reg_type field.
        let (suffix, domain) = decode_type_listing("_tcp._sub._http", '.').unwrap();
        assert_eq!(suffix, "_tcp");
        assert_eq!(domain, "_sub");
    }

    #[test]
    fn single_segment_is_malformed() {
        let err = decode_type_listing("tcp", '.').unwrap_err();
        assert!(matches!(err, DiscoveryError::MalformedRegType { .. }));

        let err = decode_instance_type("_tcp.", '.').unwrap_err();
        assert!(matches!(err, DiscoveryError::MalformedRegType { .. }));
    }

    #[test]
    fn empty_is_malformed() {
        assert!(decode_type_listing("", '.').is_err());
        assert!(decode_type_listing(".", '.').is_err());
    }

    #[test]
    fn protocol_suffix_parsing() {
        assert_eq!(Protocol::from_suffix("_tcp"), Some(Protocol::Tcp));
        assert_eq!(Protocol::from_suffix("_udp"), Some(Protocol::Udp));
        assert_eq!(Protocol::from_suffix("_sctp"), None);
        assert_eq!(Protocol::from_suffix(""), None);
    }

    #[test]
    fn subscription_browse_string() {
        let key = SubscriptionKey::new("_printer", Protocol::Tcp);
        assert_eq!(key.browse_string(), "_printer._tcp");
        assert_eq!(key.to_string(), "_printer._tcp");
    }

    #[test]
    fn key_spaces_are_distinct_types() {
        // Same textual ingredients, different identities: these can never
        // be compared or mixed up by construction.
        let summary = SummaryKey::new("local.", "_tcp.local.", "_http");
        let other = SummaryKey::new("local.", "_tcp.", "local._http");
        assert_ne!(summary, other);
    }
}
