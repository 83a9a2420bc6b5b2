//! # Outpost - Cloud Exposure Scanner
//!
//! Outpost takes the public IP addresses recorded in a cloud asset
//! inventory, port-scans them, and reports which resource exposes which
//! ports, enriched with reverse DNS names and owning instance ids.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use outpost::config::{AppSettings, RunContext};
//! use outpost::enrich::Enricher;
//! use outpost::inventory::JsonFileInventory;
//! use outpost::pipeline::{self, RunOutcome};
//! use outpost::scanner::TcpConnectEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = RunContext::new(AppSettings::default())?;
//!     let inventory = JsonFileInventory::new("inventory.json");
//!     let engine = TcpConnectEngine::new(ctx.ports.clone(), ctx.settings.timeout());
//!     let enricher = Enricher::new(ctx.settings.timeout());
//!
//!     let shutdown = std::future::pending();
//!     let outcome = pipeline::run(&ctx, &inventory, &engine, enricher, shutdown).await?;
//!     if let RunOutcome::Completed(report) = outcome {
//!         for record in &report.exposure.records {
//!             println!("{} {}", record.public_address, record.ports_label());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`inventory`] - Reading the public-IP inventory
//! - [`index`] - Address to resource lookup
//! - [`scanner`] - The scan-engine boundary and a TCP connect engine
//! - [`enrich`] - Reverse DNS and instance identity lookups
//! - [`aggregator`] - Concurrent correlation of findings into exposure records
//! - [`pipeline`] - One end-to-end run
//! - [`output`] - Plain, CSV and JSON rendering
//! - [`config`] - Settings and the per-run context
//! - [`error`] - Error types

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod enrich;
pub mod error;
pub mod index;
pub mod inventory;
pub mod output;
pub mod pipeline;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use aggregator::{Anomaly, ExposureAggregator, ExposureRecord, ExposureReport};
pub use error::{InventoryError, LookupError, RunError, ScanError};
pub use index::ResourceIndex;
pub use pipeline::{RunOutcome, RunReport};
pub use scanner::{FindingSink, ScanEngine};
pub use types::{Port, PortSpec, ResourceRecord, RunId, ScanFinding};
