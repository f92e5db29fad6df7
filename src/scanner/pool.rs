//! Worker pool scheduler.
//!
//! Drives one session from `running` to a terminal state. Probes run as
//! tokio tasks, each holding a semaphore permit, so at most
//! `concurrency` are in flight. Outcomes come back through a `JoinSet`
//! and this loop is the only place that records them.

use crate::scanner::traits::{ProbeOutcome, ProbeStatus, Prober};
use crate::session::{LogLevel, ScanSession};
use crate::types::{Host, Port};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info_span, Instrument};

/// Run the scan for `session` to completion.
///
/// A pending session is started here; a terminal one is left alone. Host
/// resolution happens first; if it fails the session ends `failed` with
/// no probe dispatched. Ports are dispatched in ascending order.
pub async fn run<P>(session: Arc<ScanSession>, prober: Arc<P>)
where
    P: Prober + 'static,
{
    let span = info_span!(
        "scan",
        session = %session.id().short(),
        host = %session.config().host()
    );
    drive(session, prober).instrument(span).await
}

async fn drive<P>(session: Arc<ScanSession>, prober: Arc<P>)
where
    P: Prober + 'static,
{
    // `start_with` has already begun the session; a bare `run` begins it here.
    match session.begin() {
        Ok(()) => {}
        Err(_) if !session.status().is_terminal() => {}
        Err(e) => {
            debug!(error = %e, status = %session.status(), "session already finished");
            return;
        }
    }
    let config = session.config();

    let addr = match prober.resolve(config.host()).await {
        Ok(addr) => addr,
        Err(e) => {
            session.fail(e.to_string());
            return;
        }
    };
    session.set_address(addr);
    if let Host::Name(name) = config.host() {
        session.log(LogLevel::Info, format!("Resolved {} to {}", name, addr));
    }

    let slots = Arc::new(Semaphore::new(config.concurrency()));
    let cancel = session.cancel_token();
    let mut tasks: JoinSet<ProbeOutcome> = JoinSet::new();
    let mut in_flight: HashMap<task::Id, Port> = HashMap::new();
    let mut pending = config.ports().iter();
    let mut next = pending.next();

    loop {
        tokio::select! {
            biased;

            Some(joined) = tasks.join_next_with_id() => {
                let outcome = match joined {
                    Ok((id, outcome)) => {
                        in_flight.remove(&id);
                        outcome
                    }
                    Err(err) => {
                        let Some(port) = in_flight.remove(&err.id()) else {
                            continue;
                        };
                        error!(%port, error = %err, "probe task aborted");
                        ProbeOutcome::new(addr.to_string(), port, ProbeStatus::Error)
                    }
                };
                session.record(outcome);
            }

            _ = cancel.cancelled(), if next.is_some() => {
                debug!(in_flight = tasks.len(), "cancellation requested, draining");
                next = None;
            }

            permit = Arc::clone(&slots).acquire_owned(), if next.is_some() => {
                let Some(port) = next else { continue };
                let Ok(permit) = permit else {
                    error!("worker slots closed");
                    next = None;
                    continue;
                };
                if !session.begin_dispatch() {
                    next = None;
                    continue;
                }

                let prober = Arc::clone(&prober);
                let handle = tasks.spawn(async move {
                    let _permit = permit;
                    prober.probe(addr, port).await
                });
                in_flight.insert(handle.id(), port);
                next = pending.next();
            }

            else => break,
        }
    }

    session.settle();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundsPolicy, ScanConfig};
    use crate::session::SessionStatus;
    use crate::types::{HostError, PortSpec};
    use async_trait::async_trait;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps per probe and records how many probes overlap.
    #[derive(Default)]
    struct CountingProber {
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, addr: IpAddr, port: Port) -> ProbeOutcome {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            let status = if port.as_u16() % 2 == 0 {
                ProbeStatus::Open
            } else {
                ProbeStatus::Closed
            };
            ProbeOutcome::new(addr.to_string(), port, status)
        }
    }

    struct UnresolvableProber;

    #[async_trait]
    impl Prober for UnresolvableProber {
        async fn resolve(&self, host: &Host) -> Result<IpAddr, HostError> {
            Err(HostError::NoAddressesFound(host.to_string()))
        }

        async fn probe(&self, _addr: IpAddr, _port: Port) -> ProbeOutcome {
            unreachable!("no probe may run when resolution fails")
        }
    }

    struct PanickingProber;

    #[async_trait]
    impl Prober for PanickingProber {
        async fn probe(&self, addr: IpAddr, port: Port) -> ProbeOutcome {
            if port.as_u16() == 2 {
                panic!("probe blew up");
            }
            ProbeOutcome::new(addr.to_string(), port, ProbeStatus::Closed)
        }
    }

    fn session(ports: &str, concurrency: usize) -> Arc<ScanSession> {
        let config = ScanConfig::new(
            Host::parse("127.0.0.1").unwrap(),
            PortSpec::parse(ports).unwrap(),
            concurrency,
            1.0,
            BoundsPolicy::Reject,
        )
        .unwrap();
        Arc::new(ScanSession::new(config))
    }

    #[tokio::test]
    async fn test_concurrency_bound_respected() {
        let session = session("1-60", 4);
        let prober = Arc::new(CountingProber::default());
        session.start_with(ArcProber(Arc::clone(&prober))).unwrap();

        assert_eq!(session.wait().await, SessionStatus::Completed);
        assert!(prober.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 60);

        let snap = session.snapshot();
        assert_eq!(snap.completed, snap.total);
        assert_eq!(snap.open, 30);
    }

    #[tokio::test]
    async fn test_resolution_failure_fails_session() {
        let session = session("22,80", 2);
        let handle = session.start_with(UnresolvableProber).unwrap();
        handle.await.unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::Failed);
        assert!(snap.results.is_empty());
        assert_eq!(snap.dispatched, 0);
        assert!(snap.failure.unwrap().contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_panicking_probe_becomes_error_outcome() {
        let session = session("1-3", 3);
        session.start_with(PanickingProber).unwrap().await.unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::Completed);
        let broken: Vec<_> = snap
            .results
            .iter()
            .filter(|r| r.status == ProbeStatus::Error)
            .map(|r| r.port.as_u16())
            .collect();
        assert_eq!(broken, vec![2]);
    }

    #[tokio::test]
    async fn test_run_starts_pending_session() {
        let session = session("10-19", 3);
        run(Arc::clone(&session), Arc::new(CountingProber::default())).await;

        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::Completed);
        assert!(snap.started_at.is_some());
        assert_eq!(snap.results.len(), 10);
    }

    #[tokio::test]
    async fn test_run_leaves_cancelled_session_alone() {
        let session = session("10-19", 3);
        session.request_cancel();
        run(Arc::clone(&session), Arc::new(UnresolvableProber)).await;

        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::Cancelled);
        assert_eq!(snap.failure, None);
    }

    #[tokio::test]
    async fn test_run_on_started_session_scans_once() {
        let session = session("1-5", 2);
        session.begin().unwrap();
        let prober = Arc::new(CountingProber::default());
        run(Arc::clone(&session), Arc::clone(&prober)).await;

        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 5);
        let (logs, _) = session.logs_since(0);
        assert_eq!(logs.iter().filter(|e| e.message.starts_with("Scanning")).count(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let session = session("1", 1);
        session.start_with(CountingProber::default()).unwrap();
        assert!(session.start_with(CountingProber::default()).is_err());
        session.wait().await;
    }

    /// Lets a test keep a handle on the prober it hands to the session.
    struct ArcProber(Arc<CountingProber>);

    #[async_trait]
    impl Prober for ArcProber {
        async fn probe(&self, addr: IpAddr, port: Port) -> ProbeOutcome {
            self.0.probe(addr, port).await
        }
    }
}
