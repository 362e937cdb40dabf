use crate::catalog::CatalogClient;
use crate::error::Result;

/// Pick the datacenters to scan.
///
/// An explicit datacenter wins, then the configured list, then whatever the
/// catalog reports. Catalog failures propagate as-is.
pub async fn resolve(
    catalog: &dyn CatalogClient,
    explicit: Option<&str>,
    configured: &[String],
) -> Result<Vec<String>> {
    if let Some(dc) = explicit.filter(|dc| !dc.is_empty()) {
        return Ok(vec![dc.to_string()]);
    }
    if !configured.is_empty() {
        return Ok(configured.to_vec());
    }
    catalog.datacenters().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::stub::{Query, StubCatalog};
    use crate::error::DirectoryError;

    #[tokio::test]
    async fn test_explicit_datacenter_wins() {
        let catalog = StubCatalog::new(&["dc1", "dc2"]);
        let configured = vec!["dc3".to_string()];

        let dcs = resolve(&catalog, Some("dc9"), &configured).await.unwrap();

        assert_eq!(dcs, vec!["dc9"]);
        assert!(catalog.queries().is_empty());
    }

    #[tokio::test]
    async fn test_configured_list_kept_in_order() {
        let catalog = StubCatalog::new(&["dc1", "dc2"]);
        let configured = vec!["dc2".to_string(), "dc3".to_string()];

        let dcs = resolve(&catalog, None, &configured).await.unwrap();

        assert_eq!(dcs, vec!["dc2", "dc3"]);
        assert!(catalog.queries().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_catalog() {
        let catalog = StubCatalog::new(&["dc1", "dc2"]);

        let dcs = resolve(&catalog, None, &[]).await.unwrap();

        assert_eq!(dcs, vec!["dc1", "dc2"]);
        assert_eq!(catalog.queries(), vec![Query::Datacenters]);
    }

    #[tokio::test]
    async fn test_empty_explicit_is_ignored() {
        let catalog = StubCatalog::new(&["dc1", "dc2"]);

        let dcs = resolve(&catalog, Some(""), &[]).await.unwrap();

        assert_eq!(dcs, vec!["dc1", "dc2"]);
    }

    #[tokio::test]
    async fn test_fallback_failure_propagates() {
        let catalog = StubCatalog::new(&["dc1", "dc2"]).datacenters_unavailable();

        let err = resolve(&catalog, None, &[]).await.unwrap_err();

        match err {
            DirectoryError::CatalogProtocol { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "No cluster leader");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(catalog.queries(), vec![Query::Datacenters]);
    }
}
