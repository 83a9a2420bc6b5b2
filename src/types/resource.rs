//! Inventory records for publicly addressed resources.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A cloud resource holding a public address, as reported by the inventory.
///
/// For network interfaces `id` is the interface id (`eni-...`), which is
/// also the key for the instance-identity lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    pub public_address: IpAddr,
    pub kind: String,
    pub account: String,
    pub region: String,
    pub availability_zone: String,
}

impl ResourceRecord {
    /// Create a record with the identity fields set; location fields start empty.
    pub fn new(id: impl Into<String>, public_address: IpAddr, account: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            public_address,
            kind: String::new(),
            account: account.into(),
            region: String::new(),
            availability_zone: String::new(),
        }
    }

    /// Set region and availability zone.
    pub fn with_location(mut self, region: impl Into<String>, zone: impl Into<String>) -> Self {
        self.region = region.into();
        self.availability_zone = zone.into();
        self
    }
}
