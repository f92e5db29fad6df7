//! Validated, immutable configuration for one scan session.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Host, PortSelection, PortSpec};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// What to do with a concurrency or timeout value outside the allowed range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsPolicy {
    /// Refuse to build the configuration.
    #[default]
    Reject,
    /// Pull the value into range and record a warning.
    Clamp,
}

/// Configuration of a single scan: target, ports, worker count and
/// per-probe timeout.
#[derive(Debug, Clone, Serialize)]
pub struct ScanConfig {
    host: Host,
    ports: PortSpec,
    concurrency: usize,
    #[serde(rename = "timeout_secs", serialize_with = "serialize_secs")]
    timeout: Duration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    adjustments: Vec<String>,
}

impl ScanConfig {
    pub const MIN_CONCURRENCY: usize = 1;
    pub const MAX_CONCURRENCY: usize = 100;
    pub const MIN_TIMEOUT_SECS: f64 = 0.1;
    pub const MAX_TIMEOUT_SECS: f64 = 10.0;

    /// Build a configuration, applying `policy` to out-of-range values.
    ///
    /// A non-finite timeout is rejected under either policy.
    pub fn new(
        host: Host,
        ports: PortSpec,
        concurrency: usize,
        timeout_secs: f64,
        policy: BoundsPolicy,
    ) -> ConfigResult<Self> {
        let mut adjustments = Vec::new();

        let concurrency_ok =
            (Self::MIN_CONCURRENCY..=Self::MAX_CONCURRENCY).contains(&concurrency);
        let concurrency = match (concurrency_ok, policy) {
            (true, _) => concurrency,
            (false, BoundsPolicy::Reject) => {
                return Err(ConfigError::ConcurrencyOutOfRange {
                    value: concurrency,
                    min: Self::MIN_CONCURRENCY,
                    max: Self::MAX_CONCURRENCY,
                })
            }
            (false, BoundsPolicy::Clamp) => {
                let clamped = concurrency.clamp(Self::MIN_CONCURRENCY, Self::MAX_CONCURRENCY);
                warn!(requested = concurrency, using = clamped, "concurrency out of range, clamping");
                adjustments.push(format!(
                    "Concurrency {} is outside {}-{}; using {}",
                    concurrency,
                    Self::MIN_CONCURRENCY,
                    Self::MAX_CONCURRENCY,
                    clamped
                ));
                clamped
            }
        };

        let timeout_ok = (Self::MIN_TIMEOUT_SECS..=Self::MAX_TIMEOUT_SECS).contains(&timeout_secs);
        let timeout_secs = match (timeout_ok, policy) {
            (true, _) => timeout_secs,
            (false, BoundsPolicy::Clamp) if timeout_secs.is_finite() => {
                let clamped = timeout_secs.clamp(Self::MIN_TIMEOUT_SECS, Self::MAX_TIMEOUT_SECS);
                warn!(requested = timeout_secs, using = clamped, "timeout out of range, clamping");
                adjustments.push(format!(
                    "Timeout {}s is outside {}-{}s; using {}s",
                    timeout_secs,
                    Self::MIN_TIMEOUT_SECS,
                    Self::MAX_TIMEOUT_SECS,
                    clamped
                ));
                clamped
            }
            (false, _) => {
                return Err(ConfigError::TimeoutOutOfRange {
                    value: timeout_secs,
                    min: Self::MIN_TIMEOUT_SECS,
                    max: Self::MAX_TIMEOUT_SECS,
                })
            }
        };

        Ok(Self {
            host,
            ports,
            concurrency,
            timeout: Duration::from_secs_f64(timeout_secs),
            adjustments,
        })
    }

    /// Build a configuration from raw caller input.
    pub fn from_input(
        host: &str,
        ports: &PortSelection,
        concurrency: usize,
        timeout_secs: f64,
        policy: BoundsPolicy,
    ) -> ConfigResult<Self> {
        let host = Host::parse(host)?;
        let ports = ports.resolve()?;
        Self::new(host, ports, concurrency, timeout_secs, policy)
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn ports(&self) -> &PortSpec {
        &self.ports
    }

    /// Maximum number of probes in flight at once.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Per-probe connect timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Human-readable notes about values that were clamped.
    pub fn adjustments(&self) -> &[String] {
        &self.adjustments
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
