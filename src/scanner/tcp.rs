//! TCP connect prober.
//!
//! Performs standard TCP connects using the operating system's socket API.
//! Completes the full handshake, needs no privileges.

use crate::error::ProbeError;
use crate::scanner::traits::{ProbeOutcome, ProbeStatus, Prober};
use crate::types::Port;
use async_trait::async_trait;
use std::future::Future;
use std::io::{self, ErrorKind};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Probes ports with a bounded-time `connect()`.
#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    /// Create a prober with the given per-connect timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Run `connect` for at most `limit`.
///
/// On timeout the pending connect future, and with it the socket, is
/// dropped.
async fn connect_within<T, F>(limit: Duration, connect: F) -> Result<T, ProbeError>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(limit, connect).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(classify(e)),
        Err(_) => Err(ProbeError::Timeout),
    }
}

fn classify(err: io::Error) -> ProbeError {
    match err.kind() {
        ErrorKind::ConnectionRefused => ProbeError::ConnectionRefused,
        ErrorKind::TimedOut => ProbeError::Timeout,
        _ => ProbeError::Io(err),
    }
}

/// Map a connect result (latency on success) to a probe outcome.
fn outcome_for(target: SocketAddr, port: Port, result: Result<u64, ProbeError>) -> ProbeOutcome {
    let host = target.ip().to_string();
    match result {
        Ok(latency_ms) => {
            trace!(%target, latency_ms, "open");
            ProbeOutcome::new(host, port, ProbeStatus::Open).with_latency(latency_ms)
        }
        Err(ProbeError::ConnectionRefused) => {
            trace!(%target, "closed");
            ProbeOutcome::new(host, port, ProbeStatus::Closed)
        }
        Err(ProbeError::Timeout) => {
            trace!(%target, "filtered");
            ProbeOutcome::new(host, port, ProbeStatus::Filtered)
        }
        Err(e) => {
            debug!(%target, error = %e, "probe failed");
            ProbeOutcome::new(host, port, ProbeStatus::Error)
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, addr: IpAddr, port: Port) -> ProbeOutcome {
        let target = SocketAddr::new(addr, port.as_u16());
        let start = Instant::now();

        let result = connect_within(self.timeout, TcpStream::connect(target))
            .await
            .map(|stream| {
                let latency_ms = start.elapsed().as_millis() as u64;
                drop(stream);
                latency_ms
            });
        outcome_for(target, port, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn port(n: u16) -> Port {
        Port::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_open_port() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = Port::new(listener.local_addr().unwrap().port()).unwrap();

        let prober = TcpProber::new(Duration::from_secs(1));
        let outcome = prober.probe(LOCALHOST, port).await;

        assert_eq!(outcome.status, ProbeStatus::Open);
        assert_eq!(outcome.host, "127.0.0.1");
        assert!(outcome.latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_closed_port() {
        // Bind then drop to obtain a port nobody listens on.
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = Port::new(listener.local_addr().unwrap().port()).unwrap();
        drop(listener);

        let prober = TcpProber::new(Duration::from_millis(500));
        let outcome = prober.probe(LOCALHOST, port).await;

        assert!(matches!(
            outcome.status,
            ProbeStatus::Closed | ProbeStatus::Filtered
        ));
        assert_eq!(outcome.service, None);
    }

    #[tokio::test]
    async fn test_unanswered_connect_is_filtered() {
        let result: Result<(), _> = connect_within(
            Duration::from_millis(20),
            std::future::pending::<io::Result<()>>(),
        )
        .await;
        assert!(matches!(result, Err(ProbeError::Timeout)));

        let target = SocketAddr::new(LOCALHOST, 443);
        let outcome = outcome_for(target, port(443), result.map(|_| 0));
        assert_eq!(outcome.status, ProbeStatus::Filtered);
        assert_eq!(outcome.service, None);
        assert_eq!(outcome.latency_ms, None);
    }

    #[tokio::test]
    async fn test_os_timeout_is_filtered() {
        let result: Result<(), _> = connect_within(Duration::from_secs(1), async {
            Err::<(), _>(io::Error::from(ErrorKind::TimedOut))
        })
        .await;
        assert!(matches!(result, Err(ProbeError::Timeout)));
    }

    #[test]
    fn test_classify_io_errors() {
        assert!(matches!(
            classify(io::Error::from(ErrorKind::ConnectionRefused)),
            ProbeError::ConnectionRefused
        ));
        assert!(matches!(
            classify(io::Error::from(ErrorKind::PermissionDenied)),
            ProbeError::Io(_)
        ));

        let target = SocketAddr::new(LOCALHOST, 21);
        let outcome = outcome_for(
            target,
            port(21),
            Err(classify(io::Error::from(ErrorKind::AddrNotAvailable))),
        );
        assert_eq!(outcome.status, ProbeStatus::Error);
        assert_eq!(outcome.service, None);
    }

    #[tokio::test]
    async fn test_broadcast_address_is_error() {
        // The kernel refuses TCP connects to the broadcast address outright.
        let broadcast = IpAddr::V4(Ipv4Addr::BROADCAST);
        let prober = TcpProber::new(Duration::from_secs(1));
        let outcome = prober.probe(broadcast, port(80)).await;

        assert_eq!(outcome.status, ProbeStatus::Error);
        assert_eq!(outcome.host, "255.255.255.255");
        assert_eq!(outcome.service, None);
    }
}
