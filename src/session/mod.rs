//! Scan sessions.
//!
//! A [`ScanSession`] is one end-to-end scan of a host: its configuration,
//! lifecycle status, the growing result sequence and a user-facing log.
//! The scheduler in [`crate::scanner::pool`] is the only writer of
//! results and counters; callers observe through [`ScanSession::snapshot`],
//! [`ScanSession::subscribe`] and [`ScanSession::logs_since`], and may
//! call [`ScanSession::request_cancel`] at any time.

mod registry;

pub use registry::SessionRegistry;

use crate::config::ScanConfig;
use crate::error::{SessionError, SessionResult};
use crate::scanner::{self, ProbeOutcome, Prober, TcpProber};
use crate::services::service_description;
use crate::types::SessionId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Lifecycle state of a session.
///
/// `pending -> running -> {completed | cancelled | failed}`, with
/// `running -> stopping -> cancelled` as the cancellation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Stopping,
    Completed,
    Cancelled,
    Failed,
}

impl SessionStatus {
    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Severity of a session log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A timestamped message in a session's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Consistent copy of a session's observable state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,
    pub status: SessionStatus,
    pub completed: usize,
    pub total: usize,
    /// Probes handed to a worker so far.
    pub dispatched: usize,
    pub open: usize,
    pub results: Vec<ProbeOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    /// Fraction of ports with a recorded outcome, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }

    /// Whole-number percentage, rounded down.
    pub fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (self.completed * 100 / self.total) as u8
    }

    /// Number of probes currently running.
    pub fn in_flight(&self) -> usize {
        self.dispatched - self.completed
    }

    /// Wall time since the scan started, up to its end if finished.
    pub fn duration(&self) -> chrono::Duration {
        match self.started_at {
            Some(start) => self.finished_at.unwrap_or_else(Utc::now) - start,
            None => chrono::Duration::zero(),
        }
    }

    /// Results ordered by port instead of completion order.
    pub fn sorted_results(&self) -> Vec<ProbeOutcome> {
        let mut results = self.results.clone();
        results.sort_by_key(|r| r.port);
        results
    }
}

#[derive(Debug)]
struct SessionState {
    status: SessionStatus,
    address: Option<IpAddr>,
    results: Vec<ProbeOutcome>,
    dispatched: usize,
    completed: usize,
    open: usize,
    failure: Option<String>,
    logs: Vec<LogEntry>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// One scan run bound to a single configuration.
pub struct ScanSession {
    id: SessionId,
    config: ScanConfig,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    status_tx: watch::Sender<SessionStatus>,
    cancel: CancellationToken,
}

impl ScanSession {
    /// Create a pending session.
    pub fn new(config: ScanConfig) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Pending);
        let session = Self {
            id: SessionId::new(),
            created_at: Utc::now(),
            state: Mutex::new(SessionState {
                status: SessionStatus::Pending,
                address: None,
                results: Vec::with_capacity(config.ports().len()),
                dispatched: 0,
                completed: 0,
                open: 0,
                failure: None,
                logs: Vec::new(),
                started_at: None,
                finished_at: None,
            }),
            config,
            status_tx,
            cancel: CancellationToken::new(),
        };

        for note in session.config.adjustments() {
            session.log(LogLevel::Warning, note.clone());
        }
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Number of ports this session will probe.
    pub fn total(&self) -> usize {
        self.config.ports().len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    /// Start scanning with TCP connects on the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn start(self: &Arc<Self>) -> SessionResult<JoinHandle<()>> {
        self.start_with(TcpProber::new(self.config.timeout()))
    }

    /// Start scanning with a custom prober.
    pub fn start_with<P>(self: &Arc<Self>, prober: P) -> SessionResult<JoinHandle<()>>
    where
        P: Prober + 'static,
    {
        self.begin()?;
        Ok(tokio::spawn(scanner::pool::run(
            Arc::clone(self),
            Arc::new(prober),
        )))
    }

    /// Move from `pending` to `running`.
    pub(crate) fn begin(&self) -> SessionResult<()> {
        {
            let mut state = self.lock();
            if state.status != SessionStatus::Pending {
                return Err(SessionError::AlreadyStarted(self.id.to_string()));
            }
            state.started_at = Some(Utc::now());
            self.transition(&mut state, SessionStatus::Running);
        }

        info!(
            session = %self.id.short(),
            host = %self.config.host(),
            ports = self.total(),
            concurrency = self.config.concurrency(),
            "scan started"
        );
        self.log(
            LogLevel::Info,
            format!(
                "Scanning {} port(s) on {} with {} worker(s), timeout {:.1}s",
                self.total(),
                self.config.host(),
                self.config.concurrency(),
                self.config.timeout().as_secs_f64()
            ),
        );
        Ok(())
    }

    /// Ask the session to stop. Idempotent.
    ///
    /// A running session stops dispatching and drains in-flight probes; a
    /// pending one is cancelled outright. Terminal sessions are untouched.
    /// Returns the status after the request.
    pub fn request_cancel(&self) -> SessionStatus {
        let mut state = self.lock();
        match state.status {
            SessionStatus::Pending => {
                self.transition(&mut state, SessionStatus::Cancelled);
                push_log(&mut state, LogLevel::Warning, "Scan cancelled before start".into());
            }
            SessionStatus::Running => {
                self.transition(&mut state, SessionStatus::Stopping);
                self.cancel.cancel();
                push_log(&mut state, LogLevel::Warning, "Stop requested".into());
                info!(session = %self.id.short(), "cancellation requested");
            }
            _ => {}
        }
        state.status
    }

    /// Copy the observable state. Never waits on probes.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_of(&self.lock())
    }

    /// A snapshot together with the log entries from `index` onwards and
    /// the next index, all read under one lock.
    pub fn snapshot_with_logs(&self, index: usize) -> (SessionSnapshot, Vec<LogEntry>, usize) {
        let state = self.lock();
        let (entries, next) = logs_from(&state, index);
        (self.snapshot_of(&state), entries, next)
    }

    fn snapshot_of(&self, state: &SessionState) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            host: self.config.host().to_string(),
            address: state.address,
            status: state.status,
            completed: state.completed,
            total: self.total(),
            dispatched: state.dispatched,
            open: state.open,
            results: state.results.clone(),
            failure: state.failure.clone(),
            created_at: self.created_at,
            started_at: state.started_at,
            finished_at: state.finished_at,
        }
    }

    /// Receive every status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Wait until the session reaches a terminal state.
    pub async fn wait(&self) -> SessionStatus {
        let mut rx = self.subscribe();
        let result = match rx.wait_for(|status| status.is_terminal()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        result
    }

    /// Log entries from `index` onwards, plus the index to ask for next.
    pub fn logs_since(&self, index: usize) -> (Vec<LogEntry>, usize) {
        logs_from(&self.lock(), index)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn log(&self, level: LogLevel, message: String) {
        push_log(&mut self.lock(), level, message);
    }

    pub(crate) fn set_address(&self, addr: IpAddr) {
        self.lock().address = Some(addr);
    }

    /// Reserve the right to dispatch one more probe. False once the
    /// session is no longer running.
    pub(crate) fn begin_dispatch(&self) -> bool {
        let mut state = self.lock();
        if state.status != SessionStatus::Running {
            return false;
        }
        state.dispatched += 1;
        true
    }

    /// Append an outcome and advance the counter in one step. The last
    /// outcome also performs the terminal transition.
    pub(crate) fn record(&self, outcome: ProbeOutcome) {
        let mut state = self.lock();
        if state.status.is_terminal() {
            warn!(session = %self.id.short(), port = %outcome.port, "outcome after terminal state dropped");
            return;
        }

        if outcome.is_open() {
            state.open += 1;
            push_log(
                &mut state,
                LogLevel::Success,
                format!(
                    "Port {} is open: {}",
                    outcome.port,
                    service_description(outcome.port.as_u16())
                ),
            );
        }
        state.results.push(outcome);
        state.completed += 1;

        if state.completed == self.total() {
            let next = match state.status {
                SessionStatus::Stopping => SessionStatus::Cancelled,
                _ => SessionStatus::Completed,
            };
            self.finish(&mut state, next);
        }
    }

    /// Terminal failure before or instead of probing.
    pub(crate) fn fail(&self, reason: String) {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return;
        }
        error!(session = %self.id.short(), %reason, "scan failed");
        push_log(&mut state, LogLevel::Error, reason.clone());
        state.failure = Some(reason);
        self.transition(&mut state, SessionStatus::Failed);
    }

    /// Called once the scheduler has drained every in-flight probe.
    pub(crate) fn settle(&self) {
        let mut state = self.lock();
        match state.status {
            SessionStatus::Stopping => self.finish(&mut state, SessionStatus::Cancelled),
            SessionStatus::Running if state.completed == self.total() => {
                self.finish(&mut state, SessionStatus::Completed)
            }
            SessionStatus::Running | SessionStatus::Pending => {
                let reason = format!(
                    "worker pool stopped after {} of {} ports",
                    state.completed,
                    self.total()
                );
                push_log(&mut state, LogLevel::Error, reason.clone());
                state.failure = Some(reason);
                self.transition(&mut state, SessionStatus::Failed);
            }
            _ => {}
        }
    }

    fn finish(&self, state: &mut SessionState, status: SessionStatus) {
        self.transition(state, status);
        let summary = match status {
            SessionStatus::Cancelled => format!(
                "Scan stopped: {} of {} ports probed, {} open",
                state.completed,
                self.total(),
                state.open
            ),
            _ if state.open == 0 => "Scan completed. No open ports found.".to_string(),
            _ => format!("Scan completed. Found {} open port(s).", state.open),
        };
        info!(session = %self.id.short(), %status, completed = state.completed, open = state.open, "scan finished");
        push_log(state, LogLevel::Info, summary);
    }

    fn transition(&self, state: &mut SessionState, to: SessionStatus) {
        state.status = to;
        if to.is_terminal() {
            state.finished_at = Some(Utc::now());
        }
        self.status_tx.send_replace(to);
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSession")
            .field("id", &self.id)
            .field("host", &self.config.host().to_string())
            .field("status", &self.status())
            .finish()
    }
}

fn logs_from(state: &SessionState, index: usize) -> (Vec<LogEntry>, usize) {
    let entries = state.logs.get(index..).map(<[_]>::to_vec).unwrap_or_default();
    (entries, state.logs.len())
}

fn push_log(state: &mut SessionState, level: LogLevel, message: String) {
    state.logs.push(LogEntry {
        timestamp: Utc::now(),
        level,
        message,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundsPolicy;
    use crate::scanner::ProbeStatus;
    use crate::types::{Host, Port, PortSpec};

    fn session(ports: &str) -> ScanSession {
        let config = ScanConfig::new(
            Host::parse("127.0.0.1").unwrap(),
            PortSpec::parse(ports).unwrap(),
            2,
            1.0,
            BoundsPolicy::Reject,
        )
        .unwrap();
        ScanSession::new(config)
    }

    fn outcome(port: u16, status: ProbeStatus) -> ProbeOutcome {
        ProbeOutcome::new("127.0.0.1", Port::new(port).unwrap(), status)
    }

    fn force_running(session: &ScanSession) {
        let mut state = session.lock();
        session.transition(&mut state, SessionStatus::Running);
    }

    #[test]
    fn test_new_session_is_pending() {
        let s = session("22,80");
        let snap = s.snapshot();
        assert_eq!(snap.status, SessionStatus::Pending);
        assert_eq!(snap.total, 2);
        assert_eq!(snap.completed, 0);
        assert_eq!(snap.progress(), 0.0);
    }

    #[test]
    fn test_cancel_pending_goes_straight_to_cancelled() {
        let s = session("22");
        assert_eq!(s.request_cancel(), SessionStatus::Cancelled);
        assert_eq!(s.request_cancel(), SessionStatus::Cancelled);
        assert!(s.snapshot().finished_at.is_some());
    }

    #[test]
    fn test_last_record_completes_atomically() {
        let s = session("22,80");
        force_running(&s);

        assert!(s.begin_dispatch());
        s.record(outcome(80, ProbeStatus::Open));
        let snap = s.snapshot();
        assert_eq!(snap.status, SessionStatus::Running);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.open, 1);

        assert!(s.begin_dispatch());
        s.record(outcome(22, ProbeStatus::Closed));
        let snap = s.snapshot();
        assert_eq!(snap.status, SessionStatus::Completed);
        assert_eq!(snap.progress(), 1.0);
        assert_eq!(snap.results.len(), 2);
    }

    #[test]
    fn test_stopping_blocks_dispatch_and_settles_cancelled() {
        let s = session("1-10");
        force_running(&s);
        assert!(s.begin_dispatch());

        assert_eq!(s.request_cancel(), SessionStatus::Stopping);
        assert!(s.cancel_token().is_cancelled());
        assert!(!s.begin_dispatch());

        s.record(outcome(1, ProbeStatus::Closed));
        s.settle();
        let snap = s.snapshot();
        assert_eq!(snap.status, SessionStatus::Cancelled);
        assert_eq!(snap.results.len(), 1);
        assert_eq!(snap.dispatched, 1);
    }

    #[test]
    fn test_terminal_freezes_results() {
        let s = session("22");
        force_running(&s);
        s.fail("resolution failed".into());
        s.record(outcome(22, ProbeStatus::Open));

        let snap = s.snapshot();
        assert_eq!(snap.status, SessionStatus::Failed);
        assert!(snap.results.is_empty());
        assert_eq!(snap.failure.as_deref(), Some("resolution failed"));
        assert_eq!(s.request_cancel(), SessionStatus::Failed);
    }

    #[test]
    fn test_logs_since() {
        let s = session("22");
        s.log(LogLevel::Info, "one".into());
        s.log(LogLevel::Info, "two".into());

        let (all, next) = s.logs_since(0);
        assert_eq!(all.len(), 2);
        assert_eq!(next, 2);

        let (rest, next) = s.logs_since(1);
        assert_eq!(rest[0].message, "two");
        assert_eq!(next, 2);

        let (none, _) = s.logs_since(10);
        assert!(none.is_empty());
    }

    #[test]
    fn test_summary_log_never_ahead_of_status() {
        let s = Arc::new(session("1-400"));
        force_running(&s);

        std::thread::scope(|scope| {
            let writer = Arc::clone(&s);
            scope.spawn(move || {
                for port in 1..=400 {
                    writer.begin_dispatch();
                    writer.record(outcome(port, ProbeStatus::Closed));
                }
            });

            let mut index = 0;
            loop {
                let (snap, logs, next) = s.snapshot_with_logs(index);
                index = next;
                if logs.iter().any(|e| e.message.starts_with("Scan completed")) {
                    assert_eq!(snap.status, SessionStatus::Completed);
                    assert_eq!(snap.completed, 400);
                    break;
                }
                assert!(!snap.status.is_terminal());
            }
        });
    }

    #[test]
    fn test_clamp_notes_become_warnings() {
        let config = ScanConfig::new(
            Host::parse("127.0.0.1").unwrap(),
            PortSpec::parse("22").unwrap(),
            1000,
            1.0,
            BoundsPolicy::Clamp,
        )
        .unwrap();
        let s = ScanSession::new(config);
        let (logs, _) = s.logs_since(0);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Warning);
    }

    #[tokio::test]
    async fn test_subscribe_sees_transitions() {
        let s = session("22");
        let mut rx = s.subscribe();
        force_running(&s);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionStatus::Running);

        s.request_cancel();
        s.settle();
        assert_eq!(s.wait().await, SessionStatus::Cancelled);
    }
}
