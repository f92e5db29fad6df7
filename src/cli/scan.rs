//! Scan subcommand implementation.
//!
//! Handles the `skiff scan <host>` command for port scanning.

use crate::cli::OutputFormat;
use crate::config::{AppSettings, BoundsPolicy, ScanConfig};
use crate::output;
use crate::session::{ScanSession, SessionStatus};
use crate::types::PortSelection;
use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PORTS: &str = "1-1000";
const REFRESH: Duration = Duration::from_millis(100);

/// Scan a host for open ports.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Host to scan (IP address or hostname)
    ///
    /// Examples:
    ///   192.168.1.1        IPv4 address
    ///   ::1                IPv6 address
    ///   example.com        Hostname
    #[arg(value_name = "HOST")]
    pub host: String,

    /// Ports to scan (e.g., "80", "80,443", "1-1000", "22,80,443,8000-9000")
    #[arg(short, long, conflicts_with = "predefined")]
    pub ports: Option<String>,

    /// Scan the built-in list of common service ports
    #[arg(long)]
    pub predefined: bool,

    /// Number of concurrent probes (1-100)
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Per-probe connect timeout in seconds (0.1-10)
    #[arg(short = 't', long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,

    /// Show closed ports in output
    #[arg(long)]
    pub show_closed: bool,

    /// Clamp out-of-range concurrency and timeout instead of failing
    #[arg(long)]
    pub clamp: bool,
}

impl ScanCommand {
    fn selection(&self, settings: &AppSettings) -> PortSelection {
        match &self.ports {
            Some(expr) => PortSelection::Expression(expr.clone()),
            None if self.predefined || settings.use_predefined_ports => PortSelection::Predefined,
            None => PortSelection::Expression(DEFAULT_PORTS.to_string()),
        }
    }

    /// Build the scan configuration, filling unset values from settings.
    pub fn scan_config(&self, settings: &AppSettings) -> Result<ScanConfig> {
        let policy = if self.clamp {
            BoundsPolicy::Clamp
        } else {
            settings.bounds_policy
        };

        ScanConfig::from_input(
            &self.host,
            &self.selection(settings),
            self.concurrency.unwrap_or(settings.default_concurrency),
            self.timeout.unwrap_or(settings.default_timeout_secs),
            policy,
        )
        .context("invalid scan options")
    }

    /// Execute the scan command.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> Result<SessionStatus> {
        let config = self.scan_config(settings)?;
        let interactive = !quiet && self.output == OutputFormat::Plain;

        if interactive {
            output::print_scan_header(&self.host, config.ports().len(), config.concurrency());
        }

        let session = Arc::new(ScanSession::new(config));
        let handle = session.start()?;

        let progress = if interactive {
            let pb = ProgressBar::new(session.total() as u64);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interrupted = false;
        let mut ticker = tokio::time::interval(REFRESH);

        let status = loop {
            tokio::select! {
                status = session.wait() => break status,

                signal = &mut ctrl_c, if !interrupted => {
                    interrupted = true;
                    if signal.is_ok() {
                        progress.suspend(|| {
                            output::print_warning("interrupted, waiting for in-flight probes")
                        });
                        session.request_cancel();
                    }
                }

                _ = ticker.tick() => {
                    let snap = session.snapshot();
                    progress.set_position(snap.completed as u64);
                    progress.set_message(format!("{} open", snap.open));
                }
            }
        };
        progress.finish_and_clear();
        handle.await.context("scan task panicked")?;

        let snapshot = session.snapshot();
        output::print_results(&snapshot, self.output, self.show_closed)?;

        if status == SessionStatus::Failed {
            bail!(
                "scan failed: {}",
                snapshot.failure.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> ScanCommand {
        let mut argv = vec!["scan"];
        argv.extend_from_slice(args);
        ScanCommand::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_come_from_settings() {
        let settings = AppSettings {
            default_concurrency: 25,
            default_timeout_secs: 2.0,
            ..AppSettings::default()
        };
        let config = command(&["127.0.0.1"]).scan_config(&settings).unwrap();

        assert_eq!(config.concurrency(), 25);
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert_eq!(config.ports().len(), 1000);
    }

    #[test]
    fn test_predefined_from_settings() {
        let settings = AppSettings {
            use_predefined_ports: true,
            ..AppSettings::default()
        };
        let config = command(&["127.0.0.1"]).scan_config(&settings).unwrap();
        assert_eq!(config.ports(), &crate::types::PortSpec::predefined());

        let config = command(&["127.0.0.1", "-p", "22"]).scan_config(&settings).unwrap();
        assert_eq!(config.ports().len(), 1);
    }

    #[test]
    fn test_clamp_flag_overrides_policy() {
        let settings = AppSettings::default();
        assert!(command(&["127.0.0.1", "-c", "500"]).scan_config(&settings).is_err());

        let config = command(&["127.0.0.1", "-c", "500", "--clamp"])
            .scan_config(&settings)
            .unwrap();
        assert_eq!(config.concurrency(), ScanConfig::MAX_CONCURRENCY);
        assert_eq!(config.adjustments().len(), 1);
    }

    #[test]
    fn test_bad_ports_rejected() {
        let err = command(&["127.0.0.1", "-p", "100-50"])
            .scan_config(&AppSettings::default())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("100"));
    }
}
