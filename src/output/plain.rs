//! Plain text output formatting.
//!
//! Tables are left-aligned and padded to the widest cell in each column.
//! They carry no color so the text stays stable when piped.

use super::COLUMNS;
use crate::aggregator::ExposureReport;
use crate::types::ResourceRecord;
use console::style;

const GAP: &str = "   ";

/// The exposure table: one row per resource with at least one open port.
pub fn exposure_table(report: &ExposureReport) -> String {
    let rows = report
        .records
        .iter()
        .map(|record| {
            vec![
                record.public_address.to_string(),
                record.ports_label(),
                record.resource_id.clone(),
                record.account.clone(),
            ]
        })
        .collect();
    table(&COLUMNS, rows)
}

/// The resources a scan would target, used when scanning is skipped.
pub fn discovery_table(records: &[ResourceRecord]) -> String {
    let rows = records
        .iter()
        .map(|record| {
            vec![
                record.public_address.to_string(),
                record.id.clone(),
                record.account.clone(),
                record.region.clone(),
            ]
        })
        .collect();
    table(&["IP ADDRESS", "RESOURCE ID", "ACCOUNT ID", "REGION"], rows)
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    for row in std::iter::once(&header).chain(rows.iter()) {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(GAP);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    eprintln!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("ℹ").blue().bold(), msg);
}
