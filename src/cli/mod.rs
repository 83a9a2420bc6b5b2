//! CLI subcommand definitions and handlers.
//!
//! - `outpost run --inventory <file>` - Scan every public address in the inventory
//! - `outpost query` - Print the inventory query to run against the asset service

mod run;

pub use run::RunCommand;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Outpost - find open ports on the public addresses of a cloud estate.
///
/// Reads the public IP inventory exported from the asset-configuration
/// service, scans each address, and reports which resources expose which
/// ports.
#[derive(Parser, Debug)]
#[command(name = "outpost")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cloud exposure scanner", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Log level filter (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", value_name = "LEVEL")]
    pub loglevel: String,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the public addresses listed in an inventory file
    #[command(alias = "r")]
    Run(RunCommand),

    /// Print the asset query that produces the inventory file
    #[command(alias = "q")]
    Query,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned plain-text table
    #[default]
    Plain,
    /// Full run report as JSON
    Json,
    /// CSV table for spreadsheets
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
