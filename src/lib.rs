//! # skiff - A Concurrent TCP Port Scanner
//!
//! skiff probes a host with TCP connects from a bounded pool of async
//! workers and reports each port as open, closed, filtered, or error.
//!
//! ## Features
//!
//! - **Port Expressions**: `"22,80,8000-8100"` parsed into a sorted, deduplicated set
//! - **Bounded Concurrency**: at most N probes in flight, with per-probe timeouts
//! - **Live Sessions**: progress snapshots, status subscriptions, and a session log
//! - **Cooperative Cancellation**: stop dispatching, drain in-flight probes
//! - **Multiple Output Formats**: Plain text, JSON, and CSV
//! - **HTTP API**: start, poll, and stop scans over JSON
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use skiff::{BoundsPolicy, PortSelection, ScanConfig, ScanSession};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ScanConfig::from_input(
//!         "127.0.0.1",
//!         &PortSelection::Expression("22,80,443".into()),
//!         10,
//!         1.0,
//!         BoundsPolicy::Reject,
//!     )?;
//!
//!     let session = Arc::new(ScanSession::new(config));
//!     session.start()?;
//!     session.wait().await;
//!
//!     for result in session.snapshot().sorted_results() {
//!         println!("Port {} is {}", result.port, result.status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, port expressions, hosts, and session ids
//! - [`scanner`] - The `Prober` trait, the TCP prober, and the worker pool
//! - [`session`] - Session lifecycle, snapshots, and the session registry
//! - [`config`] - Scan configuration bounds and application settings
//! - [`error`] - Error types
//! - [`output`] - Output formatting utilities
//! - [`server`] - JSON HTTP API

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod scanner;
pub mod server;
pub mod services;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use config::{AppSettings, BoundsPolicy, ScanConfig};
pub use error::{ConfigError, ProbeError, SessionError};
pub use scanner::{ProbeOutcome, ProbeStatus, Prober, TcpProber};
pub use session::{ScanSession, SessionRegistry, SessionSnapshot, SessionStatus};
pub use types::{Host, HostError, Port, PortError, PortSelection, PortSpec, SessionId};
