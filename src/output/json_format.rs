//! JSON output formatting.

use crate::pipeline::RunReport;
use std::io;

/// Render the full run report, anomalies included, as pretty JSON.
pub fn to_json(report: &RunReport) -> io::Result<String> {
    let mut json = serde_json::to_string_pretty(report)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    json.push('\n');
    Ok(json)
}
