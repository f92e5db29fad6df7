//! Output formatting module.
//!
//! Renders session snapshots as plain text, JSON, or CSV.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::write_csv;
pub use json_format::write_json;
pub use plain::{
    print_error, print_info, print_scan_header, print_success, print_warning, write_plain,
};

use crate::cli::OutputFormat;
use crate::session::SessionSnapshot;
use std::io::{self, Write};

/// Format and print a snapshot according to the specified format.
pub fn print_results(
    snapshot: &SessionSnapshot,
    format: OutputFormat,
    show_closed: bool,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Plain => write_plain(&mut out, snapshot, show_closed)?,
        OutputFormat::Json => write_json(&mut out, snapshot)?,
        OutputFormat::Csv => write_csv(&mut out, snapshot, show_closed)?,
    }
    out.flush()
}
