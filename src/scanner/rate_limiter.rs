//! Rate limiting for probes.
//!
//! Token bucket over `governor`, shared by every scan worker.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Limits probes to a fixed number per second across all workers.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<GovLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    /// A limiter allowing `rate` probes per second, or `None` when `rate` is
    /// 0 (unlimited).
    pub fn new(rate: u32) -> Option<Self> {
        let rate = NonZeroU32::new(rate)?;
        Some(Self {
            limiter: Arc::new(GovLimiter::direct(Quota::per_second(rate))),
        })
    }

    /// Wait until the next probe may be sent.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_zero_rate_is_unlimited() {
        assert!(RateLimiter::new(0).is_none());
    }

    #[tokio::test]
    async fn test_burst_is_immediate() {
        let limiter = RateLimiter::new(1000).unwrap();
        let start = Instant::now();
        for _ in 0..10 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_clones_share_the_bucket() {
        let first = RateLimiter::new(10).unwrap();
        let second = first.clone();
        for _ in 0..10 {
            first.wait().await;
        }

        let start = Instant::now();
        second.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
