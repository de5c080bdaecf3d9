//! Configuration for the registration type browser

use serde::{Deserialize, Serialize};

/// Protocol suffix for TCP services (`_http._tcp`, ...)
pub const TCP_REG_TYPE_SUFFIX: &str = "_tcp";

/// Protocol suffix for UDP services (`_sleep-proxy._udp`, ...)
pub const UDP_REG_TYPE_SUFFIX: &str = "_udp";

/// Configuration for a browsing session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseConfig {
    /// Well-known meta-query domain that enumerates registration types
    #[serde(default = "default_type_enumeration_domain")]
    pub type_enumeration_domain: String,

    /// Domain the top-level browse runs in
    #[serde(default = "default_browse_domain")]
    pub browse_domain: String,

    /// Domain value used when correlating instance events back to a
    /// registration type summary (the default browse domain of the
    /// underlying DNS-SD API)
    #[serde(default)]
    pub empty_domain: String,

    /// Separator between the segments of a compound registration type
    #[serde(default = "default_reg_type_separator")]
    pub reg_type_separator: char,

    /// Capacity of the bounded per-subscription event buffer; on overflow
    /// the oldest event is dropped and a warning is reported
    #[serde(default = "default_event_buffer_capacity")]
    pub event_buffer_capacity: usize,

    /// Capacity of the notification channel handed to consumers
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            type_enumeration_domain: default_type_enumeration_domain(),
            browse_domain: default_browse_domain(),
            empty_domain: String::new(),
            reg_type_separator: default_reg_type_separator(),
            event_buffer_capacity: default_event_buffer_capacity(),
            notify_capacity: default_notify_capacity(),
        }
    }
}

impl BrowseConfig {
    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.type_enumeration_domain.is_empty() {
            return Err("type_enumeration_domain cannot be empty".to_string());
        }

        if self.browse_domain.is_empty() {
            return Err("browse_domain cannot be empty".to_string());
        }

        if self.event_buffer_capacity == 0 {
            return Err("event_buffer_capacity cannot be 0".to_string());
        }

        if self.notify_capacity == 0 {
            return Err("notify_capacity cannot be 0".to_string());
        }

        Ok(())
    }
}

// Default configuration values

fn default_type_enumeration_domain() -> String {
    "_services._dns-sd._udp".to_string()
}

fn default_browse_domain() -> String {
    "local.".to_string()
}

fn default_reg_type_separator() -> char {
    '.'
}

fn default_event_buffer_capacity() -> usize {
    1000
}

fn default_notify_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BrowseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.type_enumeration_domain, "_services._dns-sd._udp");
        assert_eq!(config.browse_domain, "local.");
        assert_eq!(config.empty_domain, "");
        assert_eq!(config.event_buffer_capacity, 1000);
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = BrowseConfig {
            event_buffer_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BrowseConfig {
            notify_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_domains_rejected() {
        let config = BrowseConfig {
            type_enumeration_domain: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BrowseConfig {
            browse_domain: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: BrowseConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.reg_type_separator, '.');
        assert_eq!(config.notify_capacity, 1000);
    }
}
