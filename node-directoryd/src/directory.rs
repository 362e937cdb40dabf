use indexmap::IndexMap;
use shared::types::{CatalogEntry, NodeRecord};
use crate::catalog::CatalogClient;
use crate::config::DirectoryConfig;
use crate::error::Result;
use crate::resolver;

/// Address-keyed accumulator for catalog instances.
///
/// Records keep first-discovered order. `nodename` and `datacenter` follow
/// the last instance seen for an address; tags only ever grow.
#[derive(Debug)]
pub struct Directory {
    nodes: IndexMap<String, NodeRecord>,
    append_tags: bool,
}

impl Directory {
    pub fn new(append_tags: bool) -> Self {
        Self {
            nodes: IndexMap::new(),
            append_tags,
        }
    }

    pub fn add(&mut self, entry: &CatalogEntry, datacenter: &str) {
        let record = self
            .nodes
            .entry(entry.address.clone())
            .or_insert_with(|| NodeRecord::new(entry.address.clone()));

        record.nodename = entry.node_name.clone();
        record.datacenter = datacenter.to_string();

        // Virtual tag for the service itself
        record.tags.insert(entry.service_name.clone());

        for tag in &entry.tags {
            if self.append_tags {
                record.tags.insert(format!("{}:{}", entry.service_name, tag));
            } else {
                record.tags.insert(tag.clone());
            }
        }
    }

    /// Finish the directory, merging `attributes` into every record
    pub fn into_records(self, attributes: &serde_json::Map<String, serde_json::Value>) -> Vec<NodeRecord> {
        self.nodes
            .into_values()
            .map(|mut record| {
                for (key, value) in attributes {
                    record.attributes.insert(key.clone(), value.clone());
                }
                record
            })
            .collect()
    }
}

/// Build the node directory for one scope.
///
/// Queries run sequentially: datacenters in resolved order, then services
/// in configured (or catalog) order, so overwrites are reproducible. The
/// first catalog failure aborts the whole build.
pub async fn build(catalog: &dyn CatalogClient, config: &DirectoryConfig) -> Result<Vec<NodeRecord>> {
    let datacenters = resolver::resolve(catalog, None, &config.datacenters).await?;
    let mut directory = Directory::new(config.append_tags);
    let mut queries = 0usize;

    for dc in &datacenters {
        let services: Vec<String> = if config.services.is_empty() {
            catalog
                .services(Some(dc.as_str()))
                .await?
                .into_keys()
                .filter(|name| !config.exclude.contains(name))
                .collect()
        } else {
            config.services.clone()
        };

        for service in &services {
            let entries = catalog.service_instances(service, Some(dc.as_str())).await?;
            queries += 1;
            for entry in &entries {
                directory.add(entry, dc);
            }
        }
    }

    let records = directory.into_records(&config.node_attributes);
    tracing::debug!(
        "Built directory: {} datacenters, {} service queries, {} nodes",
        datacenters.len(),
        queries,
        records.len()
    );

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::stub::{Query, StubCatalog};
    use crate::error::DirectoryError;
    use serde_json::json;

    fn entry(service: &str, node: &str, address: &str, tags: &[&str]) -> CatalogEntry {
        CatalogEntry {
            service_name: service.to_string(),
            node_name: node.to_string(),
            address: address.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn tags(record: &NodeRecord) -> Vec<&str> {
        record.tags.iter().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn test_single_instance_end_to_end() {
        let catalog = StubCatalog::new(&["dc1"])
            .instance("dc1", "web", "n1", "10.0.0.1", &["v2"]);
        let config = DirectoryConfig {
            services: vec!["web".to_string()],
            ..DirectoryConfig::default()
        };

        let records = build(&catalog, &config).await.unwrap();

        assert_eq!(
            serde_json::to_value(&records).unwrap(),
            json!([{
                "nodename": "n1",
                "hostname": "10.0.0.1",
                "datacenter": "dc1",
                "tags": ["web", "web:v2"]
            }])
        );
    }

    #[test]
    fn test_tags_are_a_union_regardless_of_order() {
        let entries = [
            entry("web", "n1", "10.0.0.1", &["v2", "primary"]),
            entry("api", "n1", "10.0.0.1", &["v1"]),
            entry("web", "n1", "10.0.0.1", &["v2", "canary"]),
        ];

        let mut forward = Directory::new(true);
        for e in &entries {
            forward.add(e, "dc1");
        }
        let mut backward = Directory::new(true);
        for e in entries.iter().rev() {
            backward.add(e, "dc1");
        }

        let forward = forward.into_records(&Default::default());
        let backward = backward.into_records(&Default::default());
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].tags, backward[0].tags);
        assert_eq!(
            tags(&forward[0]),
            vec!["api", "api:v1", "web", "web:canary", "web:primary", "web:v2"]
        );
    }

    #[test]
    fn test_last_write_wins_for_name_and_datacenter() {
        let mut directory = Directory::new(true);
        directory.add(&entry("web", "old-name", "10.0.0.1", &[]), "dc1");
        directory.add(&entry("db", "new-name", "10.0.0.1", &[]), "dc2");

        let records = directory.into_records(&Default::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].nodename, "new-name");
        assert_eq!(records[0].datacenter, "dc2");
        assert_eq!(tags(&records[0]), vec!["db", "web"]);
    }

    #[test]
    fn test_append_tags_toggle() {
        let e = entry("web", "n1", "10.0.0.1", &["v2"]);

        let mut appended = Directory::new(true);
        appended.add(&e, "dc1");
        let appended = appended.into_records(&Default::default());
        assert_eq!(tags(&appended[0]), vec!["web", "web:v2"]);

        let mut verbatim = Directory::new(false);
        verbatim.add(&e, "dc1");
        let verbatim = verbatim.into_records(&Default::default());
        assert_eq!(tags(&verbatim[0]), vec!["v2", "web"]);
    }

    #[tokio::test]
    async fn test_all_services_minus_exclude() {
        let catalog = StubCatalog::new(&["dc1", "dc2"])
            .service("dc1", "consul", &[])
            .service("dc1", "web", &[])
            .service("dc2", "db", &[])
            .instance("dc1", "consul", "n0", "10.0.0.9", &[])
            .instance("dc1", "web", "n1", "10.0.0.1", &[])
            .instance("dc2", "db", "n2", "10.0.1.1", &["master"]);
        let config = DirectoryConfig {
            exclude: ["consul".to_string()].into_iter().collect(),
            ..DirectoryConfig::default()
        };

        let records = build(&catalog, &config).await.unwrap();

        let hosts: Vec<&str> = records.iter().map(|r| r.hostname.as_str()).collect();
        assert_eq!(hosts, vec!["10.0.0.1", "10.0.1.1"]);
        assert_eq!(records[1].datacenter, "dc2");
        assert_eq!(tags(&records[1]), vec!["db", "db:master"]);
        assert_eq!(
            catalog.queries(),
            vec![
                Query::Datacenters,
                Query::Services(Some("dc1".to_string())),
                Query::Instances("web".to_string(), Some("dc1".to_string())),
                Query::Services(Some("dc2".to_string())),
                Query::Instances("db".to_string(), Some("dc2".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_same_address_across_datacenters() {
        let catalog = StubCatalog::new(&["dc1", "dc2"])
            .instance("dc1", "web", "n1", "10.0.0.1", &["a"])
            .instance("dc2", "web", "n1-dr", "10.0.0.1", &["b"]);
        let config = DirectoryConfig {
            services: vec!["web".to_string()],
            datacenters: vec!["dc1".to_string(), "dc2".to_string()],
            ..DirectoryConfig::default()
        };

        let records = build(&catalog, &config).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].nodename, "n1-dr");
        assert_eq!(records[0].datacenter, "dc2");
        assert_eq!(tags(&records[0]), vec!["web", "web:a", "web:b"]);
    }

    #[tokio::test]
    async fn test_node_attributes_applied_to_every_record() {
        let catalog = StubCatalog::new(&["dc1"])
            .instance("dc1", "web", "n1", "10.0.0.1", &[])
            .instance("dc1", "web", "n2", "10.0.0.2", &[]);
        let mut config = DirectoryConfig {
            services: vec!["web".to_string()],
            ..DirectoryConfig::default()
        };
        config.node_attributes.insert("username".to_string(), json!("rundeck"));

        let records = build(&catalog, &config).await.unwrap();

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.attributes["username"], "rundeck");
        }
    }

    #[tokio::test]
    async fn test_failure_discards_partial_directory() {
        let catalog = StubCatalog::new(&["dc1"])
            .instance("dc1", "web", "n1", "10.0.0.1", &[])
            .failing("db");
        let config = DirectoryConfig {
            services: vec!["web".to_string(), "db".to_string()],
            ..DirectoryConfig::default()
        };

        let err = build(&catalog, &config).await.unwrap_err();
        assert!(matches!(err, DirectoryError::CatalogProtocol { status: 500, .. }));
    }
}
