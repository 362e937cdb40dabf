use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use serde::Deserialize;
use serde_json::{Map, Value};
use anyhow::{bail, Context, Result};
use shared::protocol::LISTEN_PORT_ENV;

/// Configuration file as written on disk.
///
/// Catalog connection and directory keys sit at the top level; `projects`
/// holds named scopes with the same keys.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    #[serde(default)]
    pub listen_port: Option<u16>,
    #[serde(default)]
    pub debug: bool,
    #[serde(flatten)]
    pub scope: ScopeFile,
    #[serde(default)]
    pub projects: BTreeMap<String, ScopeFile>,
}

/// Keys accepted both at the top level and inside a project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeFile {
    #[serde(flatten)]
    pub connection: ConnectionFile,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub exclude: BTreeSet<String>,
    #[serde(default = "default_append_tags")]
    pub append_tags: bool,
    #[serde(default)]
    pub node_attributes: Map<String, Value>,
    #[serde(default)]
    pub datacenters: Vec<String>,
}

/// Connection keys; anything a project leaves out comes from the top level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub token: Option<String>,
    pub scheme: Option<Scheme>,
    pub tls_verify: Option<bool>,
    pub client_cert: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Resolved connection parameters for one catalog endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConnection {
    pub host: String,
    pub port: u16,
    pub token: Option<String>,
    pub scheme: Scheme,
    pub tls_verify: bool,
    /// PEM file holding the client certificate and its private key
    pub client_cert: Option<PathBuf>,
}

impl Default for CatalogConnection {
    fn default() -> Self {
        Self {
            host: default_catalog_host(),
            port: default_catalog_port(),
            token: None,
            scheme: Scheme::default(),
            tls_verify: true,
            client_cert: None,
        }
    }
}

impl CatalogConnection {
    /// Base URL of the catalog HTTP API, without the version prefix
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

/// Everything the directory builder and the service lister need for one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryConfig {
    pub catalog: CatalogConnection,
    /// Explicit allow-list; empty means every service in the catalog
    pub services: Vec<String>,
    pub exclude: BTreeSet<String>,
    pub append_tags: bool,
    pub node_attributes: Map<String, Value>,
    /// Datacenters to scan; empty means every datacenter the catalog knows
    pub datacenters: Vec<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConnection::default(),
            services: Vec::new(),
            exclude: BTreeSet::new(),
            append_tags: default_append_tags(),
            node_attributes: Map::new(),
            datacenters: Vec::new(),
        }
    }
}

/// Validated process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_host: String,
    pub listen_port: u16,
    pub debug: bool,
    pub directory: DirectoryConfig,
    pub projects: BTreeMap<String, DirectoryConfig>,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_catalog_host() -> String {
    "localhost".to_string()
}

fn default_catalog_port() -> u16 {
    8500
}

fn default_append_tags() -> bool {
    true
}

impl Config {
    /// Load configuration from a JSON file, or TOML when the path ends in `.toml`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let file: FileConfig = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        let env_port = std::env::var(LISTEN_PORT_ENV).ok();
        Self::resolve(file, env_port.as_deref())
    }

    /// Validate a parsed file and fill in defaults.
    ///
    /// `env_port` is the raw value of the legacy listen port variable; the
    /// file's `listen_port` takes precedence over it.
    pub fn resolve(file: FileConfig, env_port: Option<&str>) -> Result<Self> {
        let listen_port = match (file.listen_port, env_port) {
            (Some(port), _) => port,
            (None, Some(raw)) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("Invalid {} value: {:?}", LISTEN_PORT_ENV, raw))?,
            (None, None) => default_listen_port(),
        };

        let base = resolve_connection(&file.scope.connection, &CatalogConnection::default())
            .context("Invalid catalog connection")?;
        let directory = resolve_scope(file.scope, &base);

        let mut projects = BTreeMap::new();
        for (name, scope) in file.projects {
            if name.trim().is_empty() {
                bail!("Project names must not be empty");
            }
            let catalog = resolve_connection(&scope.connection, &base)
                .with_context(|| format!("Invalid catalog connection for project '{}'", name))?;
            let scope = resolve_scope(scope, &catalog);
            projects.insert(name, scope);
        }

        Ok(Self {
            listen_host: file.listen_host,
            listen_port,
            debug: file.debug,
            directory,
            projects,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

fn resolve_connection(
    file: &ConnectionFile,
    inherited: &CatalogConnection,
) -> Result<CatalogConnection> {
    let connection = CatalogConnection {
        host: file.host.clone().unwrap_or_else(|| inherited.host.clone()),
        port: file.port.unwrap_or(inherited.port),
        token: file.token.clone().or_else(|| inherited.token.clone()),
        scheme: file.scheme.unwrap_or(inherited.scheme),
        tls_verify: file.tls_verify.unwrap_or(inherited.tls_verify),
        client_cert: file.client_cert.clone().or_else(|| inherited.client_cert.clone()),
    };

    if connection.host.trim().is_empty() {
        bail!("host must not be empty");
    }
    if connection.port == 0 {
        bail!("port must be non-zero");
    }
    if connection.client_cert.is_some() && connection.scheme == Scheme::Http {
        bail!("client_cert requires scheme \"https\"");
    }
    Ok(connection)
}

fn resolve_scope(scope: ScopeFile, catalog: &CatalogConnection) -> DirectoryConfig {
    DirectoryConfig {
        catalog: catalog.clone(),
        services: scope.services,
        exclude: scope.exclude,
        append_tags: scope.append_tags,
        node_attributes: scope.node_attributes,
        datacenters: scope.datacenters,
    }
}
