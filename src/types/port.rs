//! Port number and port selection types.
//!
//! `Port` guarantees a value in 1-65535. `PortSpec` describes which ports the
//! scan engine probes on every public address.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// Create a new Port from a u16, returning None for port 0.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port == 0 {
            None
        } else {
            Some(Self(port))
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Port {
    type Error = PortError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u16::try_from(value)
            .ok()
            .and_then(Port::new)
            .ok_or(PortError::OutOfRange(value))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (1-65535)")]
    OutOfRange(u32),
    #[error("invalid port number: {0}")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("empty port specification")]
    Empty,
}

/// An inclusive range of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PortRange {
    start: Port,
    end: Port,
}

impl PortRange {
    fn new(start: Port, end: Port) -> Result<Self, PortError> {
        if start > end {
            Err(PortError::InvalidRange(start.0, end.0))
        } else {
            Ok(Self { start, end })
        }
    }

    fn iter(&self) -> impl Iterator<Item = Port> {
        (self.start.0..=self.end.0).filter_map(Port::new)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Well-known top 100 TCP ports, the default probe set.
const TOP_100: [u16; 100] = [
    7, 9, 13, 21, 22, 23, 25, 26, 37, 53, 79, 80, 81, 88, 106, 110, 111, 113, 119, 135, 139, 143,
    144, 179, 199, 389, 427, 443, 444, 445, 465, 513, 514, 515, 543, 544, 548, 554, 587, 631, 646,
    873, 990, 993, 995, 1025, 1026, 1027, 1028, 1029, 1110, 1433, 1720, 1723, 1755, 1900, 2000,
    2001, 2049, 2121, 2717, 3000, 3128, 3306, 3389, 3986, 4899, 5000, 5009, 5051, 5060, 5101,
    5190, 5357, 5432, 5631, 5666, 5800, 5900, 6000, 6001, 6646, 7070, 8000, 8008, 8009, 8080,
    8081, 8443, 8888, 9100, 9999, 10000, 32768, 49152, 49153, 49154, 49155, 49156, 49157,
];

/// The set of ports probed on each target.
///
/// Parses `"top100"`, `"full"`, or a comma list of ports and ranges such as
/// `"22,80,443,8000-8100"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSpec {
    ranges: Vec<PortRange>,
}

impl PortSpec {
    /// The top 100 TCP ports.
    pub fn top_100() -> Self {
        Self {
            ranges: TOP_100
                .iter()
                .filter_map(|&p| Port::new(p))
                .map(|p| PortRange { start: p, end: p })
                .collect(),
        }
    }

    /// Every port, 1-65535.
    pub fn full() -> Self {
        Self {
            ranges: vec![PortRange {
                start: Port(1),
                end: Port(u16::MAX),
            }],
        }
    }

    /// All ports as a sorted, deduplicated vector.
    pub fn to_ports(&self) -> Vec<Port> {
        let mut ports: Vec<Port> = self.ranges.iter().flat_map(|r| r.iter()).collect();
        ports.sort_unstable();
        ports.dedup();
        ports
    }
}

fn parse_port(s: &str) -> Result<Port, PortError> {
    let value: u32 = s
        .trim()
        .parse()
        .map_err(|_| PortError::InvalidFormat(s.to_string()))?;
    Port::try_from(value)
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "" => return Err(PortError::Empty),
            "top100" | "top-100" => return Ok(Self::top_100()),
            "full" | "all" => return Ok(Self::full()),
            _ => {}
        }

        let mut ranges = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let range = match part.split_once('-') {
                Some((start, end)) => PortRange::new(parse_port(start)?, parse_port(end)?)?,
                None => {
                    let port = parse_port(part)?;
                    PortRange {
                        start: port,
                        end: port,
                    }
                }
            };
            ranges.push(range);
        }

        if ranges.is_empty() {
            return Err(PortError::Empty);
        }
        Ok(Self { ranges })
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_validation() {
        assert!(Port::new(0).is_none());
        assert!(Port::new(1).is_some());
        assert!(Port::new(65535).is_some());
        assert_eq!(Port::try_from(70000u32), Err(PortError::OutOfRange(70000)));
    }

    #[test]
    fn test_port_spec_parsing() {
        let spec: PortSpec = "80,443".parse().unwrap();
        assert_eq!(spec.to_ports().len(), 2);

        let spec: PortSpec = "22,80,443,8000-8010".parse().unwrap();
        assert_eq!(spec.to_ports().len(), 14);
    }

    #[test]
    fn test_port_spec_dedup_and_sort() {
        let spec: PortSpec = "443,80,80".parse().unwrap();
        let ports: Vec<u16> = spec.to_ports().into_iter().map(u16::from).collect();
        assert_eq!(ports, vec![80, 443]);
    }

    #[test]
    fn test_keywords() {
        let top: PortSpec = "top100".parse().unwrap();
        assert_eq!(top.to_ports().len(), 100);
        let full: PortSpec = "full".parse().unwrap();
        assert_eq!(full.to_ports().len(), 65535);
    }

    #[test]
    fn test_invalid_specs() {
        assert_eq!("".parse::<PortSpec>(), Err(PortError::Empty));
        assert_eq!("0".parse::<PortSpec>(), Err(PortError::OutOfRange(0)));
        assert_eq!(
            "100-50".parse::<PortSpec>(),
            Err(PortError::InvalidRange(100, 50))
        );
        assert!(matches!(
            "ssh".parse::<PortSpec>(),
            Err(PortError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_display() {
        let spec: PortSpec = "22, 8000-8010".parse().unwrap();
        assert_eq!(spec.to_string(), "22,8000-8010");
    }
}
