pub mod consul;
#[cfg(test)]
pub mod stub;

use async_trait::async_trait;
use indexmap::IndexMap;
use shared::types::CatalogEntry;
use crate::error::Result;

pub use consul::ConsulCatalog;

/// Service name to service tags, in the order the catalog listed them
pub type ServiceTags = IndexMap<String, Vec<String>>;

/// Read-only queries against the service catalog.
///
/// `dc` of `None` lets the catalog answer for its local datacenter.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn datacenters(&self) -> Result<Vec<String>>;

    async fn services(&self, dc: Option<&str>) -> Result<ServiceTags>;

    async fn service_instances(&self, service: &str, dc: Option<&str>) -> Result<Vec<CatalogEntry>>;
}
