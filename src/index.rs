//! Address to resource lookup, built once per run.
//!
//! The index is immutable after [`ResourceIndex::build`], so the aggregator
//! shares it between scan workers behind an `Arc` without locking.

use crate::types::ResourceRecord;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{debug, warn};

/// A second inventory record claiming an address already in the index.
///
/// The first record wins; the later one is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateAddress {
    pub address: IpAddr,
    pub kept: String,
    pub discarded: String,
}

/// Maps each public address to exactly one inventory record.
#[derive(Debug, Default)]
pub struct ResourceIndex {
    by_address: HashMap<IpAddr, ResourceRecord>,
}

impl ResourceIndex {
    /// Build the index, keeping the first record for every address.
    ///
    /// Never fails: duplicates are returned alongside the index so the
    /// caller can report them.
    pub fn build(
        records: impl IntoIterator<Item = ResourceRecord>,
    ) -> (Self, Vec<DuplicateAddress>) {
        let mut by_address: HashMap<IpAddr, ResourceRecord> = HashMap::new();
        let mut duplicates = Vec::new();

        for record in records {
            match by_address.get(&record.public_address) {
                Some(existing) => {
                    warn!(
                        address = %record.public_address,
                        kept = %existing.id,
                        discarded = %record.id,
                        "Duplicate public address in inventory"
                    );
                    duplicates.push(DuplicateAddress {
                        address: record.public_address,
                        kept: existing.id.clone(),
                        discarded: record.id,
                    });
                }
                None => {
                    by_address.insert(record.public_address, record);
                }
            }
        }

        debug!(addresses = by_address.len(), "Resource index built");
        (Self { by_address }, duplicates)
    }

    pub fn lookup(&self, address: &IpAddr) -> Option<&ResourceRecord> {
        self.by_address.get(address)
    }

    /// All indexed addresses in ascending order, the scan engine's target list.
    pub fn addresses(&self) -> Vec<IpAddr> {
        let mut addresses: Vec<IpAddr> = self.by_address.keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }

    /// The indexed records, one per address, in address order.
    pub fn records(&self) -> Vec<ResourceRecord> {
        let mut records: Vec<ResourceRecord> = self.by_address.values().cloned().collect();
        records.sort_by(|a, b| a.public_address.cmp(&b.public_address));
        records
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}
