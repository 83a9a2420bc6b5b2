//! Scan findings as delivered by the scan engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport protocol of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// One open-port observation.
///
/// Fields are kept as the engine reports them; the aggregator validates the
/// address and port before using them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanFinding {
    pub host: String,
    pub port: u32,
    pub protocol: Protocol,
}

impl ScanFinding {
    /// A TCP finding.
    pub fn tcp(host: impl Into<String>, port: u32) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: Protocol::Tcp,
        }
    }
}

impl fmt::Display for ScanFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.protocol)
    }
}
