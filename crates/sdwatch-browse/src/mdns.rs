//! `mdns-sd` backend for the browse seam
//!
//! Adapts the `mdns-sd` daemon to [`ServiceBrowse`]. A meta-query browse
//! (type enumeration) reports other registration types as if they were
//! instances, so found names are re-shaped to the event layout the
//! aggregator expects at each level.

use crate::backend::{BrowseSession, ServiceBrowse};
use mdns_sd::{ServiceDaemon, ServiceEvent as MdnsEvent};
use sdwatch_core::{DiscoveryError, Result, ServiceEvent};
use tracing::{debug, trace};

/// Capacity of the per-browse translation channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// DNS-SD meta-query prefix that enumerates registration types
const TYPE_ENUMERATION_PREFIX: &str = "_services._dns-sd";

/// Production browse backend over the shared mDNS daemon
pub struct MdnsBrowse {
    daemon: ServiceDaemon,
}

impl MdnsBrowse {
    /// Starts the mDNS daemon
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::Backend(format!("failed to start mDNS daemon: {e}")))?;
        Ok(Self { daemon })
    }
}

impl ServiceBrowse for MdnsBrowse {
    fn browse(&self, reg_type: &str, domain: &str) -> Result<BrowseSession> {
        let full_type = full_browse_type(reg_type, domain);
        let receiver =
            self.daemon
                .browse(&full_type)
                .map_err(|e| DiscoveryError::BrowseFailed {
                    reg_type: reg_type.to_string(),
                    domain: domain.to_string(),
                    reason: e.to_string(),
                })?;

        let (tx, rx) = async_channel::bounded(EVENT_CHANNEL_CAPACITY);
        let meta_query = reg_type.starts_with(TYPE_ENUMERATION_PREFIX);
        let reg_type = reg_type.to_string();
        let domain = domain.to_string();

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv_async().await {
                    Ok(MdnsEvent::SearchStopped(_)) => break,
                    Ok(event) => {
                        let Some(event) = translate(event, &reg_type, &domain, meta_query) else {
                            continue;
                        };
                        trace!(?event, "mdns event");
                        if tx.send(Ok(event)).await.is_err() {
                            break;
                        }
                    }
                    // Daemon gone; closing the stream ends the browse
                    Err(_) => break,
                }
            }
        });

        let daemon = self.daemon.clone();
        Ok(BrowseSession::new(rx, move || {
            if let Err(e) = daemon.stop_browse(&full_type) {
                debug!(browse = %full_type, error = %e, "stop_browse failed");
            }
            task.abort();
        }))
    }
}

impl Drop for MdnsBrowse {
    fn drop(&mut self) {
        let _ = self.daemon.shutdown();
    }
}

/// Full browse type handed to the daemon, e.g.
/// `("_printer._tcp", "local.")` -> `_printer._tcp.local.`
fn full_browse_type(reg_type: &str, domain: &str) -> String {
    format!(
        "{}.{}",
        reg_type.trim_end_matches('.'),
        canonical_domain(domain)
    )
}

/// Trailing-dot domain form. Type listings store their domain segment with
/// the trailing dot (it comes straight off the mDNS fullname), so instance
/// events must carry the same form for the rebuilt summary key to match.
fn canonical_domain(domain: &str) -> String {
    let domain = domain.trim_start_matches('.').trim_end_matches('.');
    if domain.is_empty() {
        "local.".to_string()
    } else {
        format!("{domain}.")
    }
}

fn translate(
    event: MdnsEvent,
    reg_type: &str,
    domain: &str,
    meta_query: bool,
) -> Option<ServiceEvent> {
    match event {
        MdnsEvent::ServiceFound(_, fullname) => {
            Some(service_event(&fullname, reg_type, domain, meta_query, false))
        }
        MdnsEvent::ServiceRemoved(_, fullname) => {
            Some(service_event(&fullname, reg_type, domain, meta_query, true))
        }
        _ => None,
    }
}

/// Re-shapes a found/removed fullname into the event layout the aggregator
/// expects for the browse level it came from.
fn service_event(
    fullname: &str,
    reg_type: &str,
    domain: &str,
    meta_query: bool,
    lost: bool,
) -> ServiceEvent {
    if meta_query {
        // The "instance" is itself a registration type, e.g.
        // `_http._tcp.local.`: first label becomes the service name, the
        // rest is the protocol-suffix-first compound type. The correlation
        // domain of type listings is empty.
        let (name, rest) = split_first_label(fullname);
        ServiceEvent {
            domain: String::new(),
            reg_type: rest.to_string(),
            service_name: name.to_string(),
            lost,
        }
    } else {
        // `<instance>.<reg_type>.<domain>`: strip the known suffix to keep
        // dotted instance names intact.
        let suffix = full_browse_type(reg_type, domain);
        let name = fullname
            .strip_suffix(&suffix)
            .map(|s| s.trim_end_matches('.'))
            .unwrap_or_else(|| split_first_label(fullname).0);
        ServiceEvent {
            domain: canonical_domain(domain),
            reg_type: format!("{}.", reg_type.trim_end_matches('.')),
            service_name: name.to_string(),
            lost,
        }
    }
}

fn split_first_label(fullname: &str) -> (&str, &str) {
    match fullname.split_once('.') {
        Some((label, rest)) => (label, rest),
        None => (fullname, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdwatch_core::{decode_instance_type, decode_type_listing};

    #[test]
    fn builds_full_browse_type() {
        assert_eq!(
            full_browse_type("_printer._tcp", "local."),
            "_printer._tcp.local."
        );
        assert_eq!(
            full_browse_type("_services._dns-sd._udp", "local."),
            "_services._dns-sd._udp.local."
        );
        assert_eq!(full_browse_type("_http._tcp.", "local"), "_http._tcp.local.");
        assert_eq!(full_browse_type("_http._tcp", ""), "_http._tcp.local.");
    }

    #[test]
    fn meta_query_found_becomes_type_listing() {
        let event = service_event("_http._tcp.local.", "_services._dns-sd._udp", "local.", true, false);
        assert_eq!(event.service_name, "_http");
        assert_eq!(event.reg_type, "_tcp.local.");
        assert_eq!(event.domain, "");
        assert!(!event.lost);
    }

    #[test]
    fn instance_found_keeps_dotted_names() {
        let event = service_event(
            "Living Room. Printer._printer._tcp.local.",
            "_printer._tcp",
            "local.",
            false,
            false,
        );
        assert_eq!(event.service_name, "Living Room. Printer");
        assert_eq!(event.reg_type, "_printer._tcp.");
        assert_eq!(event.domain, "local.");
    }

    // Walks one registration type through both browse levels the way the
    // aggregator does: the type listing stores its reg type with a trailing
    // dot, the second-level browse is opened with the decoded domain
    // (dotless), and the summary key rebuilt from the instance event must
    // land back on the stored form.
    #[test]
    fn instance_events_correlate_with_type_listings() {
        let listing = service_event(
            "_http._tcp.local.",
            "_services._dns-sd._udp",
            "local.",
            true,
            false,
        );
        assert_eq!(listing.reg_type, "_tcp.local.");

        let (suffix, service_domain) = decode_type_listing(&listing.reg_type, '.').unwrap();
        assert_eq!((suffix, service_domain), ("_tcp", "local"));

        let instance = service_event(
            "Printer._http._tcp.local.",
            "_http._tcp",
            service_domain,
            false,
            false,
        );
        let (name, instance_suffix) = decode_instance_type(&instance.reg_type, '.').unwrap();
        assert_eq!(name, "_http");

        let rebuilt = format!("{instance_suffix}.{}", instance.domain);
        assert_eq!(rebuilt, listing.reg_type);
    }

    #[test]
    fn instance_removed_sets_lost() {
        let event = service_event(
            "Printer._printer._tcp.local.",
            "_printer._tcp",
            "local.",
            false,
            true,
        );
        assert!(event.lost);
        assert_eq!(event.service_name, "Printer");
    }
}
