//! Serve subcommand: runs the JSON HTTP API.

use crate::config::AppSettings;
use crate::output;
use crate::server::{self, AppState};
use anyhow::Result;
use clap::Parser;

/// Serve the scan HTTP API.
#[derive(Parser, Debug)]
pub struct ServeCommand {
    /// Address to listen on (defaults to the settings file value)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(&self, settings: AppSettings, quiet: bool) -> Result<()> {
        let bind = self
            .bind
            .clone()
            .unwrap_or_else(|| settings.bind_address.clone());

        if !quiet {
            output::print_info(&format!("Serving scan API on http://{}/api", bind));
        }
        server::serve(&bind, AppState::new(settings)).await
    }
}
