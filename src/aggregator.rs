//! Concurrent correlation of scan findings into per-resource exposure records.
//!
//! The scan engine calls [`FindingSink::on_finding`] from any number of
//! workers at once. Records live in a fixed set of lock shards keyed by
//! resource id, so findings for unrelated resources rarely touch the same
//! lock, and no lock is ever held across an enrichment call. Within one
//! resource every update happens under its shard lock, which makes
//! create-or-fetch plus port insertion a single atomic step.

use crate::enrich::{Enricher, EnrichmentResult, Lookup, Unavailable};
use crate::index::{DuplicateAddress, ResourceIndex};
use crate::scanner::FindingSink;
use crate::types::{Port, ResourceRecord, ScanFinding};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::BuildHasher;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Everything observed for one resource during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposureRecord {
    pub resource_id: String,
    pub account: String,
    pub public_address: IpAddr,
    pub open_ports: BTreeSet<Port>,
    pub hostnames: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl ExposureRecord {
    fn new(resource: &ResourceRecord) -> Self {
        Self {
            resource_id: resource.id.clone(),
            account: resource.account.clone(),
            public_address: resource.public_address,
            open_ports: BTreeSet::new(),
            hostnames: BTreeSet::new(),
            instance_id: None,
        }
    }

    /// Open ports ascending, comma-joined.
    pub fn ports_label(&self) -> String {
        self.open_ports
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A per-item problem that is reported but never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    DuplicateAddress {
        address: IpAddr,
        kept: String,
        discarded: String,
    },
    UnknownAddress {
        address: IpAddr,
    },
    MalformedFinding {
        host: String,
        port: u32,
        reason: String,
    },
    InstanceMismatch {
        resource_id: String,
        existing: String,
        observed: String,
    },
    InstanceUnresolved {
        resource_id: String,
        reason: String,
    },
    LateFinding {
        finding: String,
    },
}

impl From<DuplicateAddress> for Anomaly {
    fn from(duplicate: DuplicateAddress) -> Self {
        Self::DuplicateAddress {
            address: duplicate.address,
            kept: duplicate.kept,
            discarded: duplicate.discarded,
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateAddress {
                address,
                kept,
                discarded,
            } => write!(
                f,
                "{} is claimed by {} and {}; kept {}",
                address, kept, discarded, kept
            ),
            Self::UnknownAddress { address } => {
                write!(f, "finding for {} matches no inventory record", address)
            }
            Self::MalformedFinding { host, port, reason } => {
                write!(f, "malformed finding {}:{}: {}", host, port, reason)
            }
            Self::InstanceMismatch {
                resource_id,
                existing,
                observed,
            } => write!(
                f,
                "{} resolved to instance {} after {}; kept {}",
                resource_id, observed, existing, existing
            ),
            Self::InstanceUnresolved {
                resource_id,
                reason,
            } => write!(f, "no instance identity for {}: {}", resource_id, reason),
            Self::LateFinding { finding } => {
                write!(f, "finding {} arrived after scan completion", finding)
            }
        }
    }
}

/// The frozen result of a run, ordered by address then resource id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExposureReport {
    pub records: Vec<ExposureRecord>,
    pub anomalies: Vec<Anomaly>,
}

impl ExposureReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct open (resource, port) pairs.
    pub fn open_port_count(&self) -> usize {
        self.records.iter().map(|r| r.open_ports.len()).sum()
    }
}

type Shard = Mutex<HashMap<String, ExposureRecord>>;

/// Thread-safe accumulator of exposure records.
pub struct ExposureAggregator {
    index: Arc<ResourceIndex>,
    enricher: Enricher,
    shards: Box<[Shard]>,
    hasher: RandomState,
    anomalies: Mutex<BTreeSet<Anomaly>>,
    sealed: AtomicBool,
    enrichments: AtomicUsize,
}

impl ExposureAggregator {
    /// Default number of lock shards.
    pub const DEFAULT_SHARDS: usize = 16;

    pub fn new(index: Arc<ResourceIndex>, enricher: Enricher, shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();

        Self {
            index,
            enricher,
            shards,
            hasher: RandomState::new(),
            anomalies: Mutex::new(BTreeSet::new()),
            sealed: AtomicBool::new(false),
            enrichments: AtomicUsize::new(0),
        }
    }

    /// Record an anomaly found outside the finding path, e.g. during indexing.
    pub fn record_anomaly(&self, anomaly: impl Into<Anomaly>) {
        lock(&self.anomalies).insert(anomaly.into());
    }

    /// Stop accepting findings. Called once the scan engine has completed or
    /// the run was cancelled; anything delivered afterwards is dropped.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// How many enrichment calls have been started.
    pub fn enrichment_count(&self) -> usize {
        self.enrichments.load(Ordering::Relaxed)
    }

    /// Copy the current state into an ordered report.
    ///
    /// Each record is copied under its shard lock, so no record is ever
    /// observed half-updated. After [`seal`](Self::seal) and engine completion
    /// the result is final; before that it is a best-effort partial view.
    pub fn snapshot(&self) -> ExposureReport {
        let mut records: Vec<ExposureRecord> = self
            .shards
            .iter()
            .flat_map(|shard| lock(shard).values().cloned().collect::<Vec<_>>())
            .collect();
        records.sort_by(|a, b| {
            a.public_address
                .cmp(&b.public_address)
                .then_with(|| a.resource_id.cmp(&b.resource_id))
        });

        ExposureReport {
            records,
            anomalies: lock(&self.anomalies).iter().cloned().collect(),
        }
    }

    async fn handle(&self, finding: ScanFinding) {
        if self.is_sealed() {
            warn!(%finding, "Finding delivered after scan completion, dropped");
            self.record_anomaly(Anomaly::LateFinding {
                finding: finding.to_string(),
            });
            return;
        }

        let Some((address, port)) = self.validate(&finding) else {
            return;
        };

        let Some(resource) = self.index.lookup(&address) else {
            warn!(%address, %port, "Open port on address not in inventory, dropped");
            self.record_anomaly(Anomaly::UnknownAddress { address });
            return;
        };

        let newly_open = self.update(resource, |record| record.open_ports.insert(port));
        if !newly_open {
            debug!(%address, %port, "Duplicate finding");
            return;
        }

        info!(
            %address,
            %port,
            protocol = %finding.protocol,
            resource_id = %resource.id,
            account = %resource.account,
            "Open port"
        );

        self.enrichments.fetch_add(1, Ordering::Relaxed);
        let result = self.enricher.enrich(resource).await;
        self.merge(resource, result);
    }

    fn validate(&self, finding: &ScanFinding) -> Option<(IpAddr, Port)> {
        let reason = match (finding.host.trim().parse::<IpAddr>(), Port::try_from(finding.port)) {
            (Ok(address), Ok(port)) => return Some((address, port)),
            (Err(_), _) => "invalid address".to_string(),
            (_, Err(e)) => e.to_string(),
        };

        warn!(%finding, %reason, "Malformed finding, dropped");
        self.record_anomaly(Anomaly::MalformedFinding {
            host: finding.host.clone(),
            port: finding.port,
            reason,
        });
        None
    }

    fn merge(&self, resource: &ResourceRecord, result: EnrichmentResult) {
        if let Lookup::Unavailable(reason) = &result.instance_id {
            if *reason != Unavailable::Disabled {
                warn!(resource_id = %resource.id, %reason, "Instance identity unavailable");
                self.record_anomaly(Anomaly::InstanceUnresolved {
                    resource_id: resource.id.clone(),
                    reason: reason.to_string(),
                });
            }
        }

        let mismatch = self.update(resource, |record| {
            record.hostnames.extend(result.hostnames().iter().cloned());

            match (record.instance_id.as_deref(), result.instance_id()) {
                (_, None) => None,
                (None, Some(observed)) => {
                    record.instance_id = Some(observed.to_string());
                    None
                }
                (Some(existing), Some(observed)) if existing == observed => None,
                (Some(existing), Some(observed)) => Some(Anomaly::InstanceMismatch {
                    resource_id: record.resource_id.clone(),
                    existing: existing.to_string(),
                    observed: observed.to_string(),
                }),
            }
        });

        if let Some(anomaly) = mismatch {
            warn!(resource_id = %resource.id, "{}", anomaly);
            self.record_anomaly(anomaly);
        }
    }

    /// Run `apply` on the record for `resource`, creating it first if needed.
    fn update<T>(
        &self,
        resource: &ResourceRecord,
        apply: impl FnOnce(&mut ExposureRecord) -> T,
    ) -> T {
        let mut shard = lock(self.shard_for(&resource.id));
        let record = shard
            .entry(resource.id.clone())
            .or_insert_with(|| ExposureRecord::new(resource));
        apply(record)
    }

    fn shard_for(&self, resource_id: &str) -> &Shard {
        let slot = self.hasher.hash_one(resource_id) as usize % self.shards.len();
        &self.shards[slot]
    }
}

#[async_trait]
impl FindingSink for ExposureAggregator {
    async fn on_finding(&self, finding: ScanFinding) {
        self.handle(finding).await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
