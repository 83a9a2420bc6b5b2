//! Best-effort enrichment of exposed resources.
//!
//! Two independent lookups run for every newly observed open port:
//!
//! - reverse DNS on the public address, via a [`ReverseResolver`]
//! - instance identity for the resource's network interface, via an
//!   [`InstanceLookup`]
//!
//! Both are bounded by the same per-call timeout the scan engine uses for a
//! probe. Neither can fail an enrichment: an error, a timeout or an
//! ambiguous answer becomes [`Lookup::Unavailable`].

mod dns;
mod instance;

pub use dns::DnsReverseResolver;
pub use instance::InterfaceAttachments;

use crate::error::LookupResult;
use crate::types::ResourceRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolves an address to its PTR names.
#[async_trait]
pub trait ReverseResolver: Send + Sync {
    /// Zero or more hostnames; an empty answer is not an error.
    async fn reverse(&self, address: IpAddr) -> LookupResult<Vec<String>>;
}

/// A network interface as described by the compute control plane.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkInterface {
    #[serde(rename = "NetworkInterfaceId")]
    pub id: String,
    #[serde(rename = "Attachment", default)]
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    #[serde(rename = "InstanceId", default)]
    pub instance_id: Option<String>,
}

impl NetworkInterface {
    pub fn instance_id(&self) -> Option<&str> {
        self.attachment.as_ref()?.instance_id.as_deref()
    }
}

/// Describes network interfaces by id.
#[async_trait]
pub trait InstanceLookup: Send + Sync {
    /// Every interface the control plane returns for `interface_id`.
    async fn describe_interfaces(&self, interface_id: &str) -> LookupResult<Vec<NetworkInterface>>;
}

/// Why a lookup produced no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    /// No collaborator configured for this lookup.
    Disabled,
    TimedOut,
    Failed(String),
    /// The interface query did not return exactly one interface.
    Ambiguous(usize),
    /// The single interface has no instance attachment.
    NotAttached,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Failed(reason) => write!(f, "{}", reason),
            Self::Ambiguous(count) => write!(f, "{} network interfaces returned", count),
            Self::NotAttached => write!(f, "interface not attached to an instance"),
        }
    }
}

/// Outcome of one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Resolved(T),
    Unavailable(Unavailable),
}

impl<T> Lookup<T> {
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }
}

/// Enrichment data for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentResult {
    pub hostnames: Lookup<Vec<String>>,
    pub instance_id: Lookup<String>,
}

impl EnrichmentResult {
    /// Resolved hostnames, empty when reverse DNS was unavailable.
    pub fn hostnames(&self) -> &[String] {
        self.hostnames.resolved().map_or(&[], Vec::as_slice)
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.resolved().map(String::as_str)
    }
}

/// Runs both lookups for a resource under a shared per-call timeout.
#[derive(Clone)]
pub struct Enricher {
    resolver: Option<Arc<dyn ReverseResolver>>,
    instances: Option<Arc<dyn InstanceLookup>>,
    timeout: Duration,
}

impl Enricher {
    /// An enricher with both lookups disabled.
    pub fn new(timeout: Duration) -> Self {
        Self {
            resolver: None,
            instances: None,
            timeout,
        }
    }

    pub fn with_reverse_dns(mut self, resolver: Arc<dyn ReverseResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_instance_lookup(mut self, lookup: Arc<dyn InstanceLookup>) -> Self {
        self.instances = Some(lookup);
        self
    }

    /// Enrich `resource`. Both lookups run concurrently; this never fails.
    pub async fn enrich(&self, resource: &ResourceRecord) -> EnrichmentResult {
        let (hostnames, instance_id) = tokio::join!(
            self.lookup_hostnames(resource.public_address),
            self.lookup_instance(&resource.id)
        );
        EnrichmentResult {
            hostnames,
            instance_id,
        }
    }

    async fn lookup_hostnames(&self, address: IpAddr) -> Lookup<Vec<String>> {
        let Some(resolver) = &self.resolver else {
            return Lookup::Unavailable(Unavailable::Disabled);
        };

        match bounded(self.timeout, resolver.reverse(address)).await {
            Ok(names) => {
                let mut hostnames: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    let name = name.trim_end_matches('.').to_string();
                    if !name.is_empty() && !hostnames.contains(&name) {
                        hostnames.push(name);
                    }
                }
                debug!(%address, ?hostnames, "Reverse lookup");
                Lookup::Resolved(hostnames)
            }
            Err(reason) => {
                debug!(%address, %reason, "Reverse lookup unavailable");
                Lookup::Unavailable(reason)
            }
        }
    }

    async fn lookup_instance(&self, interface_id: &str) -> Lookup<String> {
        let Some(lookup) = &self.instances else {
            return Lookup::Unavailable(Unavailable::Disabled);
        };

        let call = lookup.describe_interfaces(interface_id);
        let interfaces = match bounded(self.timeout, call).await {
            Ok(interfaces) => interfaces,
            Err(reason) => return Lookup::Unavailable(reason),
        };

        match interfaces.as_slice() {
            [interface] => match interface.instance_id() {
                Some(instance_id) => {
                    debug!(interface_id, instance_id, "Resolved instance identity");
                    Lookup::Resolved(instance_id.to_string())
                }
                None => Lookup::Unavailable(Unavailable::NotAttached),
            },
            other => Lookup::Unavailable(Unavailable::Ambiguous(other.len())),
        }
    }
}

/// Await a collaborator call under `limit`, folding errors into [`Unavailable`].
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = LookupResult<T>>,
) -> Result<T, Unavailable> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Unavailable::Failed(e.to_string())),
        Err(_) => Err(Unavailable::TimedOut),
    }
}
