//! Client identity derivation.

use std::borrow::Borrow;
use std::net::SocketAddr;

/// Key that partitions rate limit state between clients.
///
/// Derived from the host portion of the connection's remote address.
/// Proxy headers such as `X-Forwarded-For` are ignored, so all clients
/// behind a shared gateway share one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Identity used when a request carries no remote address at all.
    pub const UNKNOWN: &'static str = "unknown";

    /// Derive an identity from a raw `host:port` remote address.
    ///
    /// The port is stripped. Addresses that cannot be split into host
    /// and port are used verbatim.
    pub fn from_remote_addr(raw: &str) -> Self {
        if let Ok(addr) = raw.parse::<SocketAddr>() {
            return Self(addr.ip().to_string());
        }

        match split_host_port(raw) {
            Some(host) => Self(host.to_string()),
            None => Self(raw.to_string()),
        }
    }

    /// Identity for requests without connection info.
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Split `host:port` or `[host]:port`, returning the host.
fn split_host_port(raw: &str) -> Option<&str> {
    let (host, port) = raw.rsplit_once(':')?;
    if port.contains(']') {
        return None;
    }

    if let Some(inner) = host.strip_prefix('[') {
        return inner.strip_suffix(']').filter(|h| !h.contains(['[', ']']));
    }

    // An unbracketed host with colons is an IPv6 address missing its port.
    if host.contains([':', '[', ']']) {
        return None;
    }

    Some(host)
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ClientIdentity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
