//! JSON HTTP API for driving scans remotely.
//!
//! Every scan started here lives in the server's [`SessionRegistry`] and is
//! polled by id. Out-of-range worker counts and timeouts are clamped, with
//! the adjustment surfaced in the session log.

use crate::config::{AppSettings, BoundsPolicy, ScanConfig};
use crate::error::SessionError;
use crate::scanner::ProbeOutcome;
use crate::services::is_cleartext_login;
use crate::session::{LogEntry, ScanSession, SessionRegistry, SessionStatus};
use crate::types::{PortSelection, SessionId};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Public address used only to pick the outbound interface; nothing is sent.
const OUTBOUND_ROUTE: (Ipv4Addr, u16) = (Ipv4Addr::new(8, 8, 8, 8), 80);

#[derive(Clone, Debug)]
pub struct AppState {
    registry: Arc<SessionRegistry>,
    settings: Arc<AppSettings>,
}

impl AppState {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            settings: Arc::new(settings),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub target: String,
    #[serde(default)]
    pub port_range: Option<String>,
    #[serde(default)]
    pub predefined: bool,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub timeout: Option<f64>,
}

impl StartRequest {
    fn selection(&self) -> PortSelection {
        match self.port_range.as_deref().map(str::trim) {
            _ if self.predefined => PortSelection::Predefined,
            None | Some("") => PortSelection::Predefined,
            Some(expr) => PortSelection::Expression(expr.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub scan_id: SessionId,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub logs_index: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub scan_id: SessionId,
    pub target: String,
    pub status: SessionStatus,
    /// Whole-number percentage.
    pub progress: u8,
    pub completed: usize,
    pub total: usize,
    pub open_ports: usize,
    /// Open ports running a cleartext-login service (ftp, telnet).
    pub vulnerable: usize,
    pub logs: Vec<LogEntry>,
    pub logs_index: usize,
    /// Seconds since the scan started.
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Present once the session is terminal, ordered by port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ProbeOutcome>>,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub scan_id: SessionId,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct LocalIpResponse {
    pub ip: IpAddr,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub scan_id: SessionId,
    pub target: String,
    pub status: SessionStatus,
    pub progress: u8,
    pub open_ports: usize,
    pub created_at: DateTime<Utc>,
}

/// Error body returned as `{ "error": "..." }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match err {
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::AlreadyStarted(_) => StatusCode::CONFLICT,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/scan/start", post(start_scan))
        .route("/scan/{id}/status", get(scan_status))
        .route("/scan/{id}/stop", post(stop_scan))
        .route("/scan/{id}", delete(remove_scan))
        .route("/scans", get(list_scans))
        .route("/local-ip", get(local_ip))
        .with_state(state);

    Router::new().nest("/api", api)
}

/// Bind `bind` and serve until Ctrl-C, then cancel whatever is still running.
pub async fn serve(bind: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!(addr = %listener.local_addr()?, "HTTP API listening");

    let registry = Arc::clone(&state.registry);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    for session in registry.list() {
        session.request_cancel();
    }
    info!("HTTP API stopped");
    Ok(())
}

async fn start_scan(
    State(app): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let config = ScanConfig::from_input(
        &req.target,
        &req.selection(),
        req.threads.unwrap_or(app.settings.default_concurrency),
        req.timeout.unwrap_or(app.settings.default_timeout_secs),
        BoundsPolicy::Clamp,
    )
    .map_err(|e| {
        warn!(host = %req.target, error = %e, "rejected scan request");
        ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let session = app.registry.create(config);
    session.start()?;
    info!(session = %session.id().short(), "scan accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            scan_id: session.id(),
        }),
    ))
}

async fn scan_status(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let session = app.registry.find(&id)?;
    Ok(Json(status_of(&session, query.logs_index)))
}

fn status_of(session: &ScanSession, logs_index: usize) -> StatusResponse {
    let (snap, logs, next_index) = session.snapshot_with_logs(logs_index);
    let vulnerable = snap
        .results
        .iter()
        .filter(|r| r.is_open() && is_cleartext_login(r.port.as_u16()))
        .count();

    StatusResponse {
        scan_id: snap.id,
        target: snap.host.clone(),
        status: snap.status,
        progress: snap.progress_percent(),
        completed: snap.completed,
        total: snap.total,
        open_ports: snap.open,
        vulnerable,
        logs,
        logs_index: next_index,
        duration: snap.duration().num_milliseconds() as f64 / 1000.0,
        failure: snap.failure.clone(),
        results: snap.status.is_terminal().then(|| snap.sorted_results()),
    }
}

async fn stop_scan(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    let session = app.registry.find(&id)?;
    let status = session.request_cancel();
    Ok(Json(StopResponse {
        scan_id: session.id(),
        status,
    }))
}

async fn remove_scan(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = app.registry.find(&id)?;
    if !session.status().is_terminal() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("session {} is still {}", session.id(), session.status()),
        ));
    }
    app.registry.remove(&session.id());
    Ok(StatusCode::NO_CONTENT)
}

async fn list_scans(State(app): State<AppState>) -> Json<Vec<SessionSummary>> {
    let summaries = app
        .registry
        .list()
        .iter()
        .map(|session| {
            let snap = session.snapshot();
            SessionSummary {
                scan_id: snap.id,
                target: snap.host.clone(),
                status: snap.status,
                progress: snap.progress_percent(),
                open_ports: snap.open,
                created_at: snap.created_at,
            }
        })
        .collect();
    Json(summaries)
}

async fn local_ip() -> Json<LocalIpResponse> {
    let ip = match outbound_ip().await {
        Ok(ip) => ip,
        Err(e) => {
            debug!(error = %e, "no outbound route, reporting loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    };
    Json(LocalIpResponse { ip })
}

/// Address of the interface the host would use to reach the internet.
/// Connecting a UDP socket only selects a route.
async fn outbound_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(OUTBOUND_ROUTE).await?;
    Ok(socket.local_addr()?.ip())
}
