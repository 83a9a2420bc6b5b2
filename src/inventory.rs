//! Resource inventory boundary.
//!
//! Public addresses come from the cloud asset-configuration service. The
//! query itself runs outside outpost (see [`PUBLIC_IP_QUERY`]); its result is
//! read back through an [`Inventory`] and turned into [`ResourceRecord`]s.

use crate::error::{InventoryError, InventoryResult};
use crate::types::ResourceRecord;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Selects every network interface that has a public IP association.
pub const PUBLIC_IP_QUERY: &str = "SELECT resourceId, resourceType, \
configuration.association.publicIp, accountId, availabilityZone, awsRegion \
WHERE resourceType = 'AWS::EC2::NetworkInterface' \
AND configuration.association.publicIp > '0.0.0.0'";

/// One row of the query result, as the service returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResource {
    pub resource_id: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub configuration: RawConfiguration,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default, rename = "awsRegion")]
    pub region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawConfiguration {
    #[serde(default)]
    pub association: Option<RawAssociation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAssociation {
    #[serde(default)]
    pub public_ip: Option<String>,
}

impl RawResource {
    pub fn public_ip(&self) -> Option<&str> {
        self.configuration.association.as_ref()?.public_ip.as_deref()
    }
}

/// Source of raw inventory rows.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Every row of the public-IP query. An error is fatal for the run.
    async fn public_resources(&self) -> InventoryResult<Vec<RawResource>>;
}

/// Reads a saved query result from disk.
///
/// Accepts the service's own output object, whose `Results` are JSON-encoded
/// strings, or a plain JSON array of row objects.
pub struct JsonFileInventory {
    path: PathBuf,
}

impl JsonFileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Inventory for JsonFileInventory {
    async fn public_resources(&self) -> InventoryResult<Vec<RawResource>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| InventoryError::ReadFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        parse_rows(&content)
    }
}

/// Parse a query result document.
pub fn parse_rows(content: &str) -> InventoryResult<Vec<RawResource>> {
    let document: Value =
        serde_json::from_str(content).map_err(|e| InventoryError::InvalidFormat(e.to_string()))?;

    let rows: Vec<Value> = match document {
        Value::Array(rows) => rows,
        Value::Object(mut object) => match object.remove("Results") {
            Some(Value::Array(results)) => results,
            Some(_) => {
                return Err(InventoryError::InvalidFormat(
                    "`Results` is not an array".to_string(),
                ))
            }
            None => {
                return Err(InventoryError::InvalidFormat(
                    "missing `Results` array".to_string(),
                ))
            }
        },
        _ => {
            return Err(InventoryError::InvalidFormat(
                "expected an object or an array".to_string(),
            ))
        }
    };

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            // The service encodes each result row as a JSON string.
            let parsed = match row {
                Value::String(encoded) => serde_json::from_str(&encoded),
                other => serde_json::from_value(other),
            };
            parsed.map_err(|e| InventoryError::InvalidRow {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Turn raw rows into records, dropping rows without a usable public address.
pub fn into_records(rows: Vec<RawResource>) -> Vec<ResourceRecord> {
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        let address = match row.public_ip().map(|ip| ip.trim().parse::<IpAddr>()) {
            Some(Ok(address)) => address,
            Some(Err(_)) => {
                warn!(
                    resource_id = %row.resource_id,
                    public_ip = ?row.public_ip(),
                    "Invalid public IP, skipping"
                );
                continue;
            }
            None => {
                debug!(resource_id = %row.resource_id, "No public IP, skipping");
                continue;
            }
        };

        info!(%address, resource_id = %row.resource_id, "Found public IP");
        let mut record = ResourceRecord::new(row.resource_id, address, row.account_id)
            .with_location(row.region, row.availability_zone);
        record.kind = row.resource_type;
        records.push(record);
    }

    records
}
