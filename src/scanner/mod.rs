//! Scan-engine boundary.
//!
//! A [`ScanEngine`] probes a list of addresses and reports each open port to
//! a [`FindingSink`], from as many concurrent workers as it likes and in no
//! particular order. Returning from [`ScanEngine::run`] is the completion
//! signal: every sink call for the batch has returned by then.

pub mod rate_limiter;
mod tcp;

pub use rate_limiter::RateLimiter;
pub use tcp::TcpConnectEngine;

use crate::error::ScanResult;
use crate::types::ScanFinding;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;

/// Receives findings from scan workers.
#[async_trait]
pub trait FindingSink: Send + Sync {
    /// Handle one finding. Called concurrently; must not panic on bad input.
    async fn on_finding(&self, finding: ScanFinding);
}

/// Trait for port-scan engines.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Number of ports probed per target.
    fn port_count(&self) -> usize;

    /// Scan `targets`, delivering open ports to `sink`.
    ///
    /// An `Err` means the engine itself failed and none of its findings can
    /// be trusted.
    async fn run(&self, targets: Vec<IpAddr>, sink: Arc<dyn FindingSink>) -> ScanResult<()>;
}
