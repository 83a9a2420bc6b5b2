//! Core type definitions using newtype patterns for type safety.

mod finding;
mod port;
mod resource;
mod run_id;

pub use finding::{Protocol, ScanFinding};
pub use port::{Port, PortError, PortSpec};
pub use resource::ResourceRecord;
pub use run_id::RunId;
