//! PTR lookups through `trust-dns-resolver`.

use super::ReverseResolver;
use crate::error::{LookupError, LookupResult};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::TokioAsyncResolver;

/// PTR lookups with a single attempt per query.
pub struct DnsReverseResolver {
    resolver: TokioAsyncResolver,
}

impl DnsReverseResolver {
    /// Create a resolver whose queries give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

#[async_trait]
impl ReverseResolver for DnsReverseResolver {
    async fn reverse(&self, address: IpAddr) -> LookupResult<Vec<String>> {
        let lookup = self.resolver.reverse_lookup(address).await;
        answer(lookup.map(|ptrs| ptrs.iter().map(|name| name.to_string()).collect()))
    }
}

/// Normalise a PTR answer: names lose the root dot, "no records" is empty.
fn answer(result: Result<Vec<String>, ResolveError>) -> LookupResult<Vec<String>> {
    match result {
        Ok(names) => Ok(names
            .into_iter()
            .map(|name| name.trim_end_matches('.').to_string())
            .filter(|name| !name.is_empty())
            .collect()),
        // NXDOMAIN and empty answers are the common case for cloud addresses.
        Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(LookupError::Resolve(e.to_string())),
    }
}
