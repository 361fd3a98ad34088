//! Resolution of the hostname written into every document.

use crate::predicate::replace_special_chars;
use std::net::UdpSocket;
use sysinfo::System;

/// Written when neither a hostname nor a local address can be determined
pub const UNKNOWN_HOST: &str = "unknown";

/// Resolve the reporting host's name once at startup.
///
/// Falls back to the local address used for outbound traffic, then to `"unknown"`.
/// The name is whatever the kernel reports, usually the short host name; no
/// reverse lookup is done, so hosts that need a fully-qualified name set
/// `elasticsearch.hostname` in the configuration.
pub fn resolve_hostname() -> String {
    let resolved = System::host_name()
        .filter(|name| !name.trim().is_empty())
        .or_else(local_address)
        .unwrap_or_else(|| {
            tracing::warn!("Could not resolve local hostname, reporting as '{}'", UNKNOWN_HOST);
            UNKNOWN_HOST.to_string()
        });
    replace_special_chars(resolved.trim())
}

/// Address of the interface that routes outbound traffic.
///
/// Connecting a UDP socket only selects a route; nothing is sent.
fn local_address() -> Option<String> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect(("192.0.2.1", 9)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then(|| ip.to_string())
}
