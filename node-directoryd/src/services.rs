use std::collections::BTreeSet;
use percent_encoding::percent_decode_str;
use regex::Regex;
use crate::catalog::CatalogClient;
use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, Result};
use crate::resolver;

/// Criteria for the service listing. Unset or empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub tag: Option<String>,
    pub tags: BTreeSet<String>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
    pub contains: Option<String>,
    /// Percent-encoded pattern as supplied by the caller
    pub regex: Option<String>,
    pub datacenter: Option<String>,
}

fn supplied(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// A `ListFilter` with its pattern compiled, ready to test service names
struct Matcher<'a> {
    filter: &'a ListFilter,
    regex: Option<Regex>,
}

impl<'a> Matcher<'a> {
    fn new(filter: &'a ListFilter) -> Result<Self> {
        let regex = match supplied(&filter.regex) {
            Some(raw) => {
                let pattern = percent_decode_str(raw)
                    .decode_utf8()
                    .map_err(|e| DirectoryError::FilterCompile {
                        pattern: raw.to_string(),
                        source: regex::Error::Syntax(format!("pattern is not valid UTF-8: {}", e)),
                    })?
                    .into_owned();
                let compiled = Regex::new(&pattern).map_err(|source| {
                    DirectoryError::FilterCompile { pattern, source }
                })?;
                Some(compiled)
            }
            None => None,
        };
        Ok(Self { filter, regex })
    }

    /// Predicates run in a fixed order and stop at the first miss
    fn matches(&self, name: &str, tags: &[String]) -> bool {
        let filter = self.filter;

        if !filter.tags.is_empty() && !tags.iter().any(|t| filter.tags.contains(t)) {
            return false;
        }
        if let Some(tag) = supplied(&filter.tag) {
            if !tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(prefix) = supplied(&filter.starts_with) {
            if !name.starts_with(prefix) {
                return false;
            }
        }
        if let Some(suffix) = supplied(&filter.ends_with) {
            if !name.ends_with(suffix) {
                return false;
            }
        }
        if let Some(needle) = supplied(&filter.contains) {
            if !name.contains(needle) {
                return false;
            }
        }
        if let Some(regex) = &self.regex {
            if !regex.is_match(name) {
                return false;
            }
        }
        true
    }
}

/// List service names matching `filter` across the resolved datacenters.
///
/// Names keep the catalog's order within a datacenter and datacenters are
/// concatenated, so a service present in two datacenters is listed twice.
/// The pattern is compiled before any catalog query.
pub async fn list(
    catalog: &dyn CatalogClient,
    config: &DirectoryConfig,
    filter: &ListFilter,
) -> Result<Vec<String>> {
    let matcher = Matcher::new(filter)?;
    let datacenters =
        resolver::resolve(catalog, filter.datacenter.as_deref(), &config.datacenters).await?;

    let mut output = Vec::new();
    for dc in &datacenters {
        let services = catalog.services(Some(dc.as_str())).await?;
        output.extend(
            services
                .into_iter()
                .filter(|(name, tags)| matcher.matches(name, tags))
                .map(|(name, _)| name),
        );
    }

    tracing::debug!(
        "Listed {} services across {} datacenters",
        output.len(),
        datacenters.len()
    );
    Ok(output)
}
