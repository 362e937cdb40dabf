use anyhow::Context;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use shared::protocol::{
    CATALOG_API_PREFIX, CATALOG_DATACENTERS, CATALOG_SERVICE, CATALOG_SERVICES, QUERY_DC,
    QUERY_TOKEN,
};
use shared::types::CatalogEntry;
use crate::catalog::{CatalogClient, ServiceTags};
use crate::config::CatalogConnection;
use crate::error::{DirectoryError, Result};

/// Characters escaped when a service name is placed in a URL path
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Catalog client speaking the Consul HTTP API.
///
/// Holds one pooled HTTP client; every call is a single GET with no retry.
#[derive(Clone)]
pub struct ConsulCatalog {
    http_client: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl ConsulCatalog {
    pub fn new(connection: &CatalogConnection) -> anyhow::Result<Self> {
        let mut builder = HttpClient::builder();

        if !connection.tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(path) = &connection.client_cert {
            let pem = std::fs::read(path)
                .with_context(|| format!("Failed to read client certificate: {}", path.display()))?;
            let identity = reqwest::Identity::from_pem(&pem)
                .with_context(|| format!("Failed to load client certificate: {}", path.display()))?;
            builder = builder.identity(identity);
        }

        let http_client = builder.build().context("Failed to build catalog HTTP client")?;

        Ok(Self {
            http_client,
            base_url: format!("{}{}", connection.base_url(), CATALOG_API_PREFIX),
            token: connection.token.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, dc: Option<&str>) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut query: Vec<(&str, &str)> = Vec::with_capacity(2);
        if let Some(token) = &self.token {
            query.push((QUERY_TOKEN, token.as_str()));
        }
        if let Some(dc) = dc {
            query.push((QUERY_DC, dc));
        }

        tracing::debug!("Catalog request: {} dc={:?}", url, dc);

        let resp = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|source| DirectoryError::Connectivity {
                endpoint: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!("Failed to read catalog error body from {}: {}", url, e);
                    status.canonical_reason().unwrap_or_default().to_string()
                }
            };
            tracing::debug!("Catalog answered {} for {}", status, url);
            return Err(DirectoryError::CatalogProtocol {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(|source| DirectoryError::Connectivity {
            endpoint: url.clone(),
            source,
        })?;

        serde_json::from_slice(&bytes).map_err(|e| DirectoryError::CatalogDecode {
            endpoint: url,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl CatalogClient for ConsulCatalog {
    async fn datacenters(&self) -> Result<Vec<String>> {
        self.get(CATALOG_DATACENTERS, None).await
    }

    async fn services(&self, dc: Option<&str>) -> Result<ServiceTags> {
        self.get(CATALOG_SERVICES, dc).await
    }

    async fn service_instances(&self, service: &str, dc: Option<&str>) -> Result<Vec<CatalogEntry>> {
        let endpoint = format!(
            "{}/{}",
            CATALOG_SERVICE,
            utf8_percent_encode(service, PATH_SEGMENT)
        );
        self.get(&endpoint, dc).await
    }
}
