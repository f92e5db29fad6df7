//! JSON output formatting.

use crate::session::SessionSnapshot;
use std::io::{self, Write};

/// Write the whole snapshot as pretty JSON, results ordered by port.
pub fn write_json<W: Write>(out: &mut W, snapshot: &SessionSnapshot) -> io::Result<()> {
    let mut snapshot = snapshot.clone();
    snapshot.results = snapshot.sorted_results();
    serde_json::to_writer_pretty(&mut *out, &snapshot).map_err(io::Error::other)?;
    writeln!(out)
}
