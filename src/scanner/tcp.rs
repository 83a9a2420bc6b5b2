//! TCP connect scan engine.
//!
//! Completes a full handshake against every (target, port) pair using the
//! operating system's socket API. No elevated privileges required.

use super::{FindingSink, RateLimiter, ScanEngine};
use crate::error::{ScanError, ScanResult};
use crate::types::{Port, ScanFinding};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tracing::{debug, info};

/// TCP connect engine with bounded concurrency and optional rate limit.
pub struct TcpConnectEngine {
    ports: Vec<Port>,
    timeout: Duration,
    concurrency: usize,
    rate_limiter: Option<RateLimiter>,
    progress: bool,
}

impl TcpConnectEngine {
    /// Create an engine probing `ports` with a per-connect `timeout`.
    pub fn new(ports: Vec<Port>, timeout: Duration) -> Self {
        Self {
            ports,
            timeout,
            concurrency: 500,
            rate_limiter: None,
            progress: false,
        }
    }

    /// Set the maximum number of in-flight probes.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Limit probes per second; 0 means unlimited.
    pub fn with_rate_limit(mut self, rate: u32) -> Self {
        self.rate_limiter = RateLimiter::new(rate);
        self
    }

    /// Show a progress bar on stderr.
    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.progress {
            return None;
        }
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
        Some(ProgressBar::new(total as u64).with_style(style))
    }
}

/// Whether `addr` accepts a connection within `limit`.
async fn probe(addr: SocketAddr, limit: Duration) -> bool {
    match timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "Port closed");
            false
        }
        Err(_) => {
            debug!(%addr, "Port filtered (timeout)");
            false
        }
    }
}

/// A spawned probe task that is aborted if the scan is dropped mid-flight.
struct Worker(JoinHandle<()>);

impl Future for Worker {
    type Output = Result<(), JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[async_trait]
impl ScanEngine for TcpConnectEngine {
    fn name(&self) -> &'static str {
        "tcp-connect"
    }

    fn port_count(&self) -> usize {
        self.ports.len()
    }

    async fn run(&self, targets: Vec<IpAddr>, sink: Arc<dyn FindingSink>) -> ScanResult<()> {
        if self.ports.is_empty() {
            return Err(ScanError::InvalidConfig("no ports to probe".to_string()));
        }
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let probes: Vec<SocketAddr> = targets
            .iter()
            .flat_map(|&ip| self.ports.iter().map(move |port| SocketAddr::new(ip, port.as_u16())))
            .collect();
        info!(
            targets = targets.len(),
            ports = self.ports.len(),
            probes = probes.len(),
            "Starting TCP connect scan"
        );
        let progress = self.progress_bar(probes.len());

        // Workers are spawned lazily, so at most `concurrency` exist at once.
        let mut workers = stream::iter(probes)
            .map(|addr| {
                let sink = Arc::clone(&sink);
                let limiter = self.rate_limiter.clone();
                let limit = self.timeout;
                Worker(tokio::spawn(async move {
                    if let Some(limiter) = limiter {
                        limiter.wait().await;
                    }
                    if probe(addr, limit).await {
                        sink.on_finding(ScanFinding::tcp(addr.ip().to_string(), addr.port().into()))
                            .await;
                    }
                }))
            })
            .buffer_unordered(self.concurrency);

        while let Some(joined) = workers.next().await {
            if let Some(pb) = &progress {
                pb.inc(1);
            }
            joined.map_err(|e| ScanError::WorkerFailed(e.to_string()))?;
        }

        if let Some(pb) = progress {
            pb.finish_with_message("Scan complete");
        }
        Ok(())
    }
}
