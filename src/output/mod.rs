//! Output formatting module.
//!
//! Renders an exposure report as an aligned plain-text table, CSV, or JSON.
//! Rendering is pure; [`write_report`] decides where the text goes.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::to_csv;
pub use json_format::to_json;
pub use plain::{
    discovery_table, exposure_table, print_error, print_info, print_success, print_warning,
};

use crate::cli::OutputFormat;
use crate::pipeline::RunReport;
use std::io::{self, Write};
use std::path::Path;

/// Column headings shared by the plain and CSV renderings.
pub const COLUMNS: [&str; 4] = ["IP ADDRESS", "OPEN PORTS", "RESOURCE ID", "ACCOUNT ID"];

/// Render `report` in the requested format.
pub fn render(report: &RunReport, format: OutputFormat) -> io::Result<String> {
    match format {
        OutputFormat::Plain => Ok(plain::exposure_table(&report.exposure)),
        OutputFormat::Csv => csv_format::to_csv(&report.exposure),
        OutputFormat::Json => json_format::to_json(report),
    }
}

/// Render `report` to `path`, or to stdout when no path is given.
pub fn write_report(
    report: &RunReport,
    format: OutputFormat,
    path: Option<&Path>,
) -> io::Result<()> {
    let rendered = render(report, format)?;
    match path {
        Some(path) => std::fs::write(path, rendered),
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            out.write_all(rendered.as_bytes())?;
            out.flush()
        }
    }
}
