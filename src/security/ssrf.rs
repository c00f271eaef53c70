//! Outbound target screening (SSRF defense).
//!
//! # Responsibilities
//! - Classify a hostname or IP as public or forbidden
//! - Resolve DNS and screen every returned address
//! - Catch wildcard-DNS hostnames that smuggle a private IPv4 in a label
//!
//! # Design Decisions
//! - Only the initially requested host is screened; redirect targets
//!   followed inside the transport are not re-checked
//! - "Name not found" resolution errors are swallowed, the request fails
//!   naturally at connect time; other resolution errors are fatal

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{RequestError, TransportError};
use crate::observability::metrics;

/// Returns true when an address must never be the target of an outbound
/// request: loopback, private, link-local, CGNAT, benchmarking,
/// multicast/reserved, and their IPv6 equivalents.
pub fn is_forbidden_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_forbidden_ipv4(v4),
        IpAddr::V6(v6) => is_forbidden_ipv6(v6),
    }
}

fn is_forbidden_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        // Carrier-grade NAT, 100.64.0.0/10
        || (octets[0] == 100 && (octets[1] & 0b1100_0000) == 64)
        // Benchmarking, 198.18.0.0/15
        || (octets[0] == 198 && (octets[1] & 0b1111_1110) == 18)
        // Multicast, reserved, broadcast
        || octets[0] >= 224
}

fn is_forbidden_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_forbidden_ipv4(mapped);
    }
    let segments = ip.segments();
    ip.is_unspecified()
        || ip.is_loopback()
        // Link-local, fe80::/10
        || (segments[0] & 0xffc0) == 0xfe80
        // Unique-local, fc00::/7
        || (segments[0] & 0xfe00) == 0xfc00
}

/// Screen a hostname without touching the network.
///
/// Rejects IP literals in the forbidden set, `localhost` and anything under
/// `*.localhost`, and `*.nip.io` names whose label encodes a forbidden
/// IPv4 address.
pub fn is_forbidden_host(host: &str) -> bool {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    // IPv6 literals arrive bracketed from URL parsing.
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return is_forbidden_ip(ip);
    }
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }
    if let Some(prefix) = host.strip_suffix(".nip.io") {
        if let Some(encoded) = embedded_ipv4(prefix) {
            return is_forbidden_ipv4(encoded);
        }
    }
    false
}

/// nip.io resolves the address encoded in the hostname itself, either as
/// trailing dotted octets ("app.10.0.0.1.nip.io") or as a dashed final
/// label ("app-10-0-0-1.nip.io").
fn embedded_ipv4(prefix: &str) -> Option<Ipv4Addr> {
    let labels: Vec<&str> = prefix.split('.').collect();
    if labels.len() >= 4 {
        let tail = labels[labels.len() - 4..].join(".");
        if let Ok(ip) = tail.parse() {
            return Some(ip);
        }
    }
    let parts: Vec<&str> = labels.last()?.split('-').collect();
    if parts.len() >= 4 {
        let tail = parts[parts.len() - 4..].join(".");
        if let Ok(ip) = tail.parse() {
            return Some(ip);
        }
    }
    None
}

/// Resolve `host` and fail if the hostname or any resolved address is in
/// the forbidden set. Runs once per call, before the transport is invoked.
pub async fn ensure_resolved_public(host: &str, port: u16) -> Result<(), RequestError> {
    if is_forbidden_host(host) {
        metrics::record_ssrf_rejected();
        tracing::warn!(host, "refusing outbound request to forbidden host");
        return Err(RequestError::SsrfRejected {
            host: host.to_string(),
            address: host.to_string(),
        });
    }

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        // Literal already screened above; nothing to resolve.
        return Ok(());
    }

    match tokio::net::lookup_host((host, port)).await {
        Ok(addrs) => {
            for addr in addrs {
                if is_forbidden_ip(addr.ip()) {
                    metrics::record_ssrf_rejected();
                    tracing::warn!(
                        host,
                        address = %addr.ip(),
                        "hostname resolved to forbidden address"
                    );
                    return Err(RequestError::SsrfRejected {
                        host: host.to_string(),
                        address: addr.ip().to_string(),
                    });
                }
            }
            Ok(())
        }
        Err(err) if is_name_not_found(&err) => Ok(()),
        Err(err) => Err(RequestError::Transport(TransportError::Dns {
            host: host.to_string(),
            message: err.to_string(),
        })),
    }
}

fn is_name_not_found(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::NotFound
        || err.to_string().contains("failed to lookup address")
}
