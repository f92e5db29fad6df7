//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `skiff scan <host>` - Scan a host
//! - `skiff serve` - Run the HTTP API
//! - `skiff config` - Show or initialise settings

mod config;
mod scan;
mod serve;

pub use config::ConfigCommand;
pub use scan::ScanCommand;
pub use serve::ServeCommand;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// skiff - A concurrent TCP port scanner.
///
/// Probes a host with TCP connects from a bounded pool of workers. Scans
/// can be run from the terminal or driven over a small JSON HTTP API.
#[derive(Parser, Debug)]
#[command(name = "skiff")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A concurrent TCP port scanner", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH", env = "SKIFF_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Default `tracing` filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "skiff=debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a host for open ports
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Serve the scan HTTP API
    Serve(ServeCommand),

    /// Show or initialise the settings file
    Config(ConfigCommand),
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}
