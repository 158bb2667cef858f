use crate::error::{GateError, Result};
use axum::extract::ConnectInfo;
use std::fmt;
use std::net::SocketAddr;

/// Identifier shared by every request whose peer address is unknown
pub const FALLBACK_IDENTITY: &str = "unknown";

/// Identity of the client a counter belongs to
///
/// Only the peer socket address is used. Forwarded headers are not consulted, so
/// behind a reverse proxy every client shares the proxy's bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    identifier: String,
}

impl ClientKey {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    /// Derive the key from the peer address of the connection
    pub fn from_connect_info(connect_info: Option<&ConnectInfo<SocketAddr>>) -> Result<Self> {
        connect_info
            .map(|ConnectInfo(addr)| Self::new(addr.ip().to_string()))
            .ok_or(GateError::UnresolvableClientIdentity)
    }

    /// Bucket used when the client address cannot be resolved
    pub fn fallback() -> Self {
        Self::new(FALLBACK_IDENTITY)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Key under which the counter lives in the store
    pub fn to_store_key(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.identifier)
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_connect_info_uses_ip_only() {
        let addr: SocketAddr = "192.168.1.1:54321".parse().unwrap();
        let key = ClientKey::from_connect_info(Some(&ConnectInfo(addr))).unwrap();
        assert_eq!(key.identifier(), "192.168.1.1");

        // Different source ports share a bucket
        let other: SocketAddr = "192.168.1.1:1111".parse().unwrap();
        let other_key = ClientKey::from_connect_info(Some(&ConnectInfo(other))).unwrap();
        assert_eq!(key, other_key);
    }

    #[test]
    fn test_key_from_ipv6_address() {
        let addr: SocketAddr = "[::1]:8080".parse().unwrap();
        let key = ClientKey::from_connect_info(Some(&ConnectInfo(addr))).unwrap();
        assert_eq!(key.identifier(), "::1");
    }

    #[test]
    fn test_missing_address_is_unresolvable() {
        let err = ClientKey::from_connect_info(None).unwrap_err();
        assert!(matches!(err, GateError::UnresolvableClientIdentity));
        assert_eq!(ClientKey::fallback().identifier(), FALLBACK_IDENTITY);
    }

    #[test]
    fn test_to_store_key() {
        let key = ClientKey::new("10.0.0.7");
        assert_eq!(
            key.to_store_key("windowgate:ratelimit:"),
            "windowgate:ratelimit:10.0.0.7"
        );
    }
}
