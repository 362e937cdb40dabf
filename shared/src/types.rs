use std::collections::BTreeSet;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use crate::protocol::{KEY_DATACENTER, KEY_HOSTNAME, KEY_NODENAME, KEY_TAGS};

/// One instance of a service as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Service the instance belongs to, e.g. "web"
    #[serde(rename = "ServiceName")]
    pub service_name: String,

    /// Catalog node name, e.g. "web-01"
    #[serde(rename = "Node")]
    pub node_name: String,

    /// Node address, e.g. "10.0.0.1"
    #[serde(rename = "Address")]
    pub address: String,

    /// Per-instance service tags
    #[serde(rename = "ServiceTags", default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A node in the directory, keyed by address.
///
/// `tags` is a set so repeated observations of the same tag collapse, and it
/// serializes in lexicographic order.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub hostname: String,
    pub nodename: String,
    pub datacenter: String,
    pub tags: BTreeSet<String>,
    /// Static attributes merged into the serialized record.
    /// A key that collides with a base field replaces it.
    pub attributes: Map<String, Value>,
}

impl NodeRecord {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            hostname: address.into(),
            nodename: String::new(),
            datacenter: String::new(),
            tags: BTreeSet::new(),
            attributes: Map::new(),
        }
    }
}

impl Serialize for NodeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let base_keys = [KEY_NODENAME, KEY_HOSTNAME, KEY_DATACENTER, KEY_TAGS];
        let shadowed = base_keys
            .iter()
            .filter(|k| self.attributes.contains_key(**k))
            .count();

        let mut map = serializer.serialize_map(Some(
            base_keys.len() - shadowed + self.attributes.len(),
        ))?;
        if !self.attributes.contains_key(KEY_NODENAME) {
            map.serialize_entry(KEY_NODENAME, &self.nodename)?;
        }
        if !self.attributes.contains_key(KEY_HOSTNAME) {
            map.serialize_entry(KEY_HOSTNAME, &self.hostname)?;
        }
        if !self.attributes.contains_key(KEY_TAGS) {
            map.serialize_entry(KEY_TAGS, &self.tags)?;
        }
        if !self.attributes.contains_key(KEY_DATACENTER) {
            map.serialize_entry(KEY_DATACENTER, &self.datacenter)?;
        }
        for (key, value) in &self.attributes {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
