//! Error types for outpost.
//!
//! Uses `thiserror` for ergonomic error definitions. Only inventory, config
//! and scan-engine errors abort a run; everything that goes wrong for a
//! single finding is an [`Anomaly`](crate::aggregator::Anomaly) instead.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain the resource inventory. Fatal: nothing is scanned.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("failed to read inventory {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid inventory document: {0}")]
    InvalidFormat(String),

    #[error("invalid inventory row {index}: {reason}")]
    InvalidRow { index: usize, reason: String },
}

/// Failure of the scan engine itself.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scan worker failed: {0}")]
    WorkerFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a best-effort enrichment collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("reverse DNS failed: {0}")]
    Resolve(String),

    #[error("instance lookup failed: {0}")]
    Api(String),

    #[error("failed to load lookup source {path}: {reason}")]
    Source { path: PathBuf, reason: String },
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid settings file: {0}")]
    InvalidFormat(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Errors that terminate a run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("failed to write report: {0}")]
    Output(#[source] std::io::Error),
}

pub type InventoryResult<T> = Result<T, InventoryError>;
pub type ScanResult<T> = Result<T, ScanError>;
pub type LookupResult<T> = Result<T, LookupError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type RunResult<T> = Result<T, RunError>;
