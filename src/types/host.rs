//! Scan target host: an IP literal or a hostname.
//!
//! Parsing only validates the shape of the string. Resolution to an
//! address happens later, inside the scheduler, so that a resolution
//! failure becomes a failed session rather than a rejected request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Error type for host parsing and resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("invalid host: '{0}'")]
    InvalidFormat(String),
    #[error("failed to resolve hostname '{0}': {1}")]
    DnsResolutionFailed(String, String),
    #[error("no IP addresses found for hostname '{0}'")]
    NoAddressesFound(String),
}

/// The host a session scans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Host {
    /// A literal IPv4 or IPv6 address.
    Ip(IpAddr),
    /// A hostname to be resolved.
    Name(String),
}

impl Host {
    /// Parse a host string.
    pub fn parse(s: &str) -> Result<Self, HostError> {
        let s = s.trim();

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Ip(ip));
        }

        if is_valid_hostname(s) {
            return Ok(Self::Name(s.to_ascii_lowercase()));
        }

        Err(HostError::InvalidFormat(s.to_string()))
    }

    /// Resolve to a single address. IP literals resolve to themselves.
    ///
    /// When a name has several addresses the first one is used.
    pub async fn resolve(&self) -> Result<IpAddr, HostError> {
        match self {
            Self::Ip(ip) => Ok(*ip),
            Self::Name(name) => {
                // System config honours /etc/hosts, so "localhost" resolves.
                let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
                    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
                });

                let response = resolver
                    .lookup_ip(name.as_str())
                    .await
                    .map_err(|e| HostError::DnsResolutionFailed(name.clone(), e.to_string()))?;

                response
                    .iter()
                    .next()
                    .ok_or_else(|| HostError::NoAddressesFound(name.clone()))
            }
        }
    }
}

impl FromStr for Host {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Host {
    type Error = HostError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Host> for String {
    fn from(host: Host) -> Self {
        host.to_string()
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "{}", ip),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Check if a string is a valid hostname (RFC 1123 labels).
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}
