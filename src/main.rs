use anyhow::{Context, Result};
use clap::Parser;
use skiff::cli::{Cli, Commands};
use skiff::config::AppSettings;
use skiff::output;
use skiff::session::SessionStatus;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = AppSettings::load(cli.config.as_deref()).context("failed to load settings")?;

    match &cli.command {
        Commands::Scan(cmd) => {
            let status = cmd.execute(&settings, cli.quiet).await?;
            // 130: interrupted.
            Ok(match status {
                SessionStatus::Cancelled => ExitCode::from(130),
                _ => ExitCode::SUCCESS,
            })
        }
        Commands::Serve(cmd) => {
            cmd.execute(settings, cli.quiet).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(cmd) => {
            cmd.execute(&settings, cli.config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
