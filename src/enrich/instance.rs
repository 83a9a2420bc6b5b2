//! Instance identity from a network-interface description document.
//!
//! The document is the compute API's describe-network-interfaces output,
//! exported once before the run:
//!
//! ```json
//! {"NetworkInterfaces": [
//!   {"NetworkInterfaceId": "eni-1", "Attachment": {"InstanceId": "i-0abc"}}
//! ]}
//! ```

use super::{InstanceLookup, NetworkInterface};
use crate::error::{LookupError, LookupResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct Document {
    #[serde(rename = "NetworkInterfaces", default)]
    network_interfaces: Vec<NetworkInterface>,
}

/// Interface descriptions grouped by interface id.
#[derive(Debug, Default)]
pub struct InterfaceAttachments {
    by_id: HashMap<String, Vec<NetworkInterface>>,
}

impl InterfaceAttachments {
    /// Load a description document from disk.
    pub fn load(path: &Path) -> LookupResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| LookupError::Source {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_json(&content).map_err(|e| LookupError::Source {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        let document: Document = serde_json::from_str(content)?;
        let mut by_id: HashMap<String, Vec<NetworkInterface>> = HashMap::new();
        for interface in document.network_interfaces {
            by_id.entry(interface.id.clone()).or_default().push(interface);
        }
        Ok(Self { by_id })
    }
}

#[async_trait]
impl InstanceLookup for InterfaceAttachments {
    async fn describe_interfaces(&self, interface_id: &str) -> LookupResult<Vec<NetworkInterface>> {
        Ok(self.by_id.get(interface_id).cloned().unwrap_or_default())
    }
}
