/// Catalog HTTP API prefix
pub const CATALOG_API_PREFIX: &str = "/v1";

/// Catalog endpoints queried by the directory
pub const CATALOG_DATACENTERS: &str = "/catalog/datacenters";
pub const CATALOG_SERVICES: &str = "/catalog/services";
pub const CATALOG_SERVICE: &str = "/catalog/service";

/// Query parameter keys understood by the catalog
pub const QUERY_DC: &str = "dc";
pub const QUERY_TOKEN: &str = "token";

/// Value of the `status` field in every error envelope
pub const ERROR_STATUS: &str = "error";

/// Legacy environment override for the listen port
pub const LISTEN_PORT_ENV: &str = "RUNDECK_CONSUL_PORT";

/// Keys of a serialized node record
pub const KEY_NODENAME: &str = "nodename";
pub const KEY_HOSTNAME: &str = "hostname";
pub const KEY_DATACENTER: &str = "datacenter";
pub const KEY_TAGS: &str = "tags";
