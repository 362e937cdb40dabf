//! In-memory catalog used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use async_trait::async_trait;
use shared::types::CatalogEntry;
use crate::catalog::{CatalogClient, ServiceTags};
use crate::error::{DirectoryError, Result};

/// A query seen by the stub, recorded in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Datacenters,
    Services(Option<String>),
    Instances(String, Option<String>),
}

#[derive(Default)]
pub struct StubCatalog {
    datacenters: Vec<String>,
    services: HashMap<String, ServiceTags>,
    instances: HashMap<(String, String), Vec<CatalogEntry>>,
    /// Service whose instance query answers with a catalog error
    failing_service: Option<String>,
    /// Datacenter whose service listing answers with a catalog error
    failing_datacenter: Option<String>,
    datacenters_unavailable: bool,
    queries: Mutex<Vec<Query>>,
}

impl StubCatalog {
    pub fn new(datacenters: &[&str]) -> Self {
        Self {
            datacenters: datacenters.iter().map(|dc| dc.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Register a service in `dc` with its catalog-level tags
    pub fn service(mut self, dc: &str, name: &str, tags: &[&str]) -> Self {
        self.services
            .entry(dc.to_string())
            .or_default()
            .insert(name.to_string(), tags.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Register one instance of `service` in `dc`
    pub fn instance(mut self, dc: &str, service: &str, node: &str, address: &str, tags: &[&str]) -> Self {
        self.instances
            .entry((dc.to_string(), service.to_string()))
            .or_default()
            .push(CatalogEntry {
                service_name: service.to_string(),
                node_name: node.to_string(),
                address: address.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            });
        self
    }

    pub fn failing(mut self, service: &str) -> Self {
        self.failing_service = Some(service.to_string());
        self
    }

    pub fn failing_datacenter(mut self, dc: &str) -> Self {
        self.failing_datacenter = Some(dc.to_string());
        self
    }

    pub fn datacenters_unavailable(mut self) -> Self {
        self.datacenters_unavailable = true;
        self
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }

    fn record(&self, query: Query) {
        self.queries.lock().unwrap().push(query);
    }
}

fn dc_key(dc: Option<&str>) -> String {
    dc.unwrap_or_default().to_string()
}

#[async_trait]
impl CatalogClient for StubCatalog {
    async fn datacenters(&self) -> Result<Vec<String>> {
        self.record(Query::Datacenters);
        if self.datacenters_unavailable {
            return Err(DirectoryError::CatalogProtocol {
                status: 503,
                body: "No cluster leader".to_string(),
            });
        }
        Ok(self.datacenters.clone())
    }

    async fn services(&self, dc: Option<&str>) -> Result<ServiceTags> {
        self.record(Query::Services(dc.map(str::to_string)));
        if dc.is_some() && self.failing_datacenter.as_deref() == dc {
            return Err(DirectoryError::CatalogProtocol {
                status: 500,
                body: format!("No path to datacenter {}", dc_key(dc)),
            });
        }
        Ok(self.services.get(&dc_key(dc)).cloned().unwrap_or_default())
    }

    async fn service_instances(&self, service: &str, dc: Option<&str>) -> Result<Vec<CatalogEntry>> {
        self.record(Query::Instances(service.to_string(), dc.map(str::to_string)));
        if self.failing_service.as_deref() == Some(service) {
            return Err(DirectoryError::CatalogProtocol {
                status: 500,
                body: format!("rpc error querying {}", service),
            });
        }
        Ok(self
            .instances
            .get(&(dc_key(dc), service.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
