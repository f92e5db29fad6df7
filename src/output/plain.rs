//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::scanner::ProbeStatus;
use crate::session::{SessionSnapshot, SessionStatus};
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Write a results table for a finished (or stopped) session.
///
/// Closed ports are hidden unless `show_closed` is set.
pub fn write_plain<W: Write>(
    out: &mut W,
    snapshot: &SessionSnapshot,
    show_closed: bool,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(
        out,
        "                    {} Scan Results",
        style("skiff").cyan().bold()
    )?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Target:").bold(), snapshot.host)?;
    if let Some(addr) = snapshot.address {
        writeln!(out, "  {} {}", style("IP Address:").bold(), addr)?;
    }
    writeln!(
        out,
        "  {} {}",
        style("Session:").bold(),
        style(snapshot.id.short()).dim()
    )?;
    writeln!(
        out,
        "  {} {}",
        style("Status:").bold(),
        status_style(snapshot.status).apply_to(snapshot.status)
    )?;
    if let Some(reason) = &snapshot.failure {
        writeln!(out, "  {} {}", style("Reason:").bold(), style(reason).red())?;
    }
    writeln!(out)?;

    let count = |status: ProbeStatus| snapshot.results.iter().filter(|r| r.status == status).count();
    writeln!(
        out,
        "  {} {}/{} ports probed in {:.2}s",
        style("Statistics:").bold(),
        snapshot.completed,
        snapshot.total,
        snapshot.duration().num_milliseconds() as f64 / 1000.0
    )?;
    writeln!(
        out,
        "               {} open, {} closed, {} filtered, {} error",
        style(count(ProbeStatus::Open)).green().bold(),
        style(count(ProbeStatus::Closed)).red(),
        style(count(ProbeStatus::Filtered)).yellow(),
        style(count(ProbeStatus::Error)).magenta()
    )?;
    writeln!(out)?;

    let rows: Vec<_> = snapshot
        .sorted_results()
        .into_iter()
        .filter(|r| show_closed || r.status != ProbeStatus::Closed)
        .collect();

    if rows.is_empty() {
        writeln!(out, "  {}", style("No ports to display.").dim())?;
    } else {
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:>6}  {:^10}  {:<15}  {}",
            style("PORT").bold(),
            style("STATE").bold(),
            style("SERVICE").bold(),
            style("LATENCY").bold()
        )?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        for result in &rows {
            let status_style = match result.status {
                ProbeStatus::Open => Style::new().green().bold(),
                ProbeStatus::Closed => Style::new().red(),
                ProbeStatus::Filtered => Style::new().yellow(),
                ProbeStatus::Error => Style::new().magenta(),
            };
            let latency = result
                .latency_ms
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_default();

            writeln!(
                out,
                "  {:>6}  {:^10}  {:<15}  {}",
                result.port,
                status_style.apply_to(result.status),
                result.service.as_deref().unwrap_or(""),
                style(latency).dim()
            )?;
        }

        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    Ok(())
}

fn status_style(status: SessionStatus) -> Style {
    match status {
        SessionStatus::Completed => Style::new().green().bold(),
        SessionStatus::Cancelled | SessionStatus::Stopping => Style::new().yellow(),
        SessionStatus::Failed => Style::new().red().bold(),
        SessionStatus::Pending | SessionStatus::Running => Style::new().cyan(),
    }
}

/// Print a scan header before scanning begins.
pub fn print_scan_header(target: &str, ports: usize, concurrency: usize) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("skiff").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{} Target: {}", style("•").dim(), style(target).white().bold());
    println!(
        "{} Scanning {} ports with {} workers...",
        style("•").dim(),
        style(ports).white().bold(),
        concurrency
    );
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print an informational message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}
