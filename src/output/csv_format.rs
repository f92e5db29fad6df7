//! CSV output formatting.

use crate::scanner::ProbeStatus;
use crate::session::SessionSnapshot;
use std::io::{self, Write};

/// Write one row per probed port.
pub fn write_csv<W: Write>(
    out: &mut W,
    snapshot: &SessionSnapshot,
    show_closed: bool,
) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["host", "port", "status", "service", "latency_ms"])?;

    for result in snapshot.sorted_results() {
        if !show_closed && result.status == ProbeStatus::Closed {
            continue;
        }
        wtr.write_record([
            result.host.as_str(),
            &result.port.to_string(),
            &result.status.to_string(),
            result.service.as_deref().unwrap_or(""),
            &result.latency_ms.map_or(String::new(), |t| t.to_string()),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
