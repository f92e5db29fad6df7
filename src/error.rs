//! Error types for skiff.
//!
//! Uses `thiserror` for ergonomic error definitions. Parse errors for ports
//! and hosts live next to their types in [`crate::types`].

use crate::types::{HostError, PortError};
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single TCP connect attempt.
///
/// Never escapes a probe: the prober classifies it into a
/// [`crate::scanner::ProbeStatus`].
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connection timed out")]
    Timeout,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building a scan configuration or loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("concurrency {value} is out of range ({min}-{max})")]
    ConcurrencyOutOfRange { value: usize, min: usize, max: usize },

    #[error("timeout {value}s is out of range ({min}-{max}s)")]
    TimeoutOutOfRange { value: f64, min: f64, max: f64 },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Ports(#[from] PortError),

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("could not determine configuration directory")]
    DirectoryNotFound,
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidFormat(err.to_string())
    }
}

/// Errors from session lifecycle calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} has already been started")]
    AlreadyStarted(String),

    #[error("session not found: {0}")]
    NotFound(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SessionResult<T> = Result<T, SessionError>;
