//! Prober trait abstraction and probe outcome types.
//!
//! The scheduler only talks to a [`Prober`]; `TcpProber` is the production
//! implementation and tests substitute their own.

use crate::services::service_name;
use crate::types::{Host, HostError, Port};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Connection established.
    Open,
    /// Connection actively refused.
    Closed,
    /// No answer within the timeout, usually a dropping firewall.
    Filtered,
    /// Any other I/O failure for this port.
    Error,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Result of probing one (host, port) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Address that was probed.
    pub host: String,
    /// The port number that was probed.
    pub port: Port,
    /// Status determined by the probe.
    pub status: ProbeStatus,
    /// Well-known service name; only set for open ports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Connect time in milliseconds; only set for open ports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl ProbeOutcome {
    /// Create an outcome, filling in the service name for open ports.
    pub fn new(host: impl Into<String>, port: Port, status: ProbeStatus) -> Self {
        let service = match status {
            ProbeStatus::Open => service_name(port.as_u16()).map(str::to_string),
            _ => None,
        };

        Self {
            host: host.into(),
            port,
            status,
            service,
            latency_ms: None,
        }
    }

    /// Set the connect latency.
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == ProbeStatus::Open
    }
}

/// A way of probing ports on a resolved address.
///
/// Implementations must not touch session state: they compute an outcome
/// and hand it back to the scheduler.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Resolve the target before any probe is dispatched.
    async fn resolve(&self, host: &Host) -> Result<IpAddr, HostError> {
        host.resolve().await
    }

    /// Probe a single port. Never fails: problems are classified into the
    /// returned outcome.
    async fn probe(&self, addr: IpAddr, port: Port) -> ProbeOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ProbeStatus::Open.to_string(), "open");
        assert_eq!(ProbeStatus::Closed.to_string(), "closed");
        assert_eq!(ProbeStatus::Filtered.to_string(), "filtered");
        assert_eq!(ProbeStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_service_only_for_open() {
        let port = Port::new(22).unwrap();
        let open = ProbeOutcome::new("127.0.0.1", port, ProbeStatus::Open).with_latency(3);
        assert_eq!(open.service.as_deref(), Some("ssh"));
        assert_eq!(open.latency_ms, Some(3));
        assert!(open.is_open());

        let closed = ProbeOutcome::new("127.0.0.1", port, ProbeStatus::Closed);
        assert_eq!(closed.service, None);

        let unknown = ProbeOutcome::new("127.0.0.1", Port::new(12345).unwrap(), ProbeStatus::Open);
        assert_eq!(unknown.service, None);
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = ProbeOutcome::new("10.0.0.1", Port::new(80).unwrap(), ProbeStatus::Open);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["port"], 80);
        assert_eq!(json["status"], "open");
        assert_eq!(json["service"], "http");
        assert!(json.get("latency_ms").is_none());
    }
}
