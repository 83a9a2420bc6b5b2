//! One exposure run: inventory, index, scan, snapshot.

use crate::aggregator::{Anomaly, ExposureAggregator, ExposureReport};
use crate::config::RunContext;
use crate::enrich::Enricher;
use crate::error::RunResult;
use crate::index::ResourceIndex;
use crate::inventory::{into_records, Inventory};
use crate::scanner::{FindingSink, ScanEngine};
use crate::types::{ResourceRecord, RunId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A finished (or cut short) scan with its exposure report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub engine: String,
    pub targets: usize,
    pub ports_per_target: usize,
    /// False when the scan was cancelled before the engine completed.
    pub complete: bool,
    #[serde(flatten)]
    pub exposure: ExposureReport,
}

/// How a run ended, short of a fatal error.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The inventory held no usable public address.
    NothingToScan,
    /// Discovery only was requested: the records that would be scanned, one
    /// per address, and the duplicates dropped while indexing them.
    DiscoveryOnly {
        records: Vec<ResourceRecord>,
        anomalies: Vec<Anomaly>,
    },
    Completed(RunReport),
    /// Deadline or shutdown hit first; the report is partial.
    Cancelled(RunReport),
}

/// Execute a run.
///
/// Only inventory and scan-engine failures are errors. `shutdown` resolving
/// before the engine completes cancels the scan and yields
/// [`RunOutcome::Cancelled`] with whatever was aggregated so far.
pub async fn run(
    ctx: &RunContext,
    inventory: &dyn Inventory,
    engine: &dyn ScanEngine,
    enricher: Enricher,
    shutdown: impl Future<Output = ()>,
) -> RunResult<RunOutcome> {
    let id = RunId::new();
    let started_at = Utc::now();
    info!(run = %id.short(), "Getting public IP addresses from inventory");

    let records = into_records(inventory.public_resources().await?);
    info!(count = records.len(), "Found public IP address(es) in inventory");

    let (index, duplicates) = ResourceIndex::build(records);
    if index.is_empty() {
        info!("Skipping scan: no public IP addresses found");
        return Ok(RunOutcome::NothingToScan);
    }

    if ctx.discover_only {
        let mut anomalies: Vec<Anomaly> = duplicates.into_iter().map(Anomaly::from).collect();
        anomalies.sort();
        return Ok(RunOutcome::DiscoveryOnly {
            records: index.records(),
            anomalies,
        });
    }

    let index = Arc::new(index);
    let aggregator = Arc::new(ExposureAggregator::new(
        Arc::clone(&index),
        enricher,
        ctx.settings.shards,
    ));
    for duplicate in duplicates {
        aggregator.record_anomaly(duplicate);
    }

    let target_count = index.len();
    let targets = index.addresses();
    info!(
        engine = engine.name(),
        targets = target_count,
        ports = engine.port_count(),
        "Starting port scan"
    );

    let sink: Arc<dyn FindingSink> = Arc::clone(&aggregator) as Arc<dyn FindingSink>;
    let complete = tokio::select! {
        result = engine.run(targets, sink) => {
            result?;
            true
        }
        _ = deadline(ctx.settings.scan_deadline()) => {
            warn!("Scan deadline reached, reporting partial results");
            false
        }
        _ = shutdown => {
            warn!("Scan cancelled, reporting partial results");
            false
        }
    };

    aggregator.seal();
    let exposure = aggregator.snapshot();
    info!(
        resources = exposure.records.len(),
        open_ports = exposure.open_port_count(),
        anomalies = exposure.anomalies.len(),
        enrichments = aggregator.enrichment_count(),
        "Finished scanning"
    );

    let report = RunReport {
        id,
        started_at,
        completed_at: Utc::now(),
        engine: engine.name().to_string(),
        targets: target_count,
        ports_per_target: engine.port_count(),
        complete,
        exposure,
    };

    Ok(if complete {
        RunOutcome::Completed(report)
    } else {
        RunOutcome::Cancelled(report)
    })
}

async fn deadline(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}
