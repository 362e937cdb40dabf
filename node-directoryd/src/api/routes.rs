use std::collections::HashMap;
use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use crate::api::query::QueryParams;
use crate::catalog::{CatalogClient, ConsulCatalog};
use crate::config::{Config, DirectoryConfig};
use crate::directory;
use crate::error::{DirectoryError, ErrorEnvelope};
use crate::services::{self, ListFilter};

/// A directory configuration paired with the catalog it reads from
#[derive(Clone)]
pub struct Scope {
    pub config: DirectoryConfig,
    pub catalog: Arc<dyn CatalogClient>,
}

impl Scope {
    pub fn connect(config: &DirectoryConfig) -> anyhow::Result<Self> {
        Ok(Self {
            config: config.clone(),
            catalog: Arc::new(ConsulCatalog::new(&config.catalog)?),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub default: Arc<Scope>,
    pub projects: Arc<HashMap<String, Arc<Scope>>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let default = Arc::new(Scope::connect(&config.directory)?);
        let mut projects = HashMap::with_capacity(config.projects.len());
        for (name, project) in &config.projects {
            let scope = Scope::connect(project)
                .map_err(|e| e.context(format!("Failed to set up project '{}'", name)))?;
            projects.insert(name.clone(), Arc::new(scope));
        }
        Ok(Self {
            default,
            projects: Arc::new(projects),
        })
    }

    fn project(&self, name: &str, path: String) -> Result<Arc<Scope>, DirectoryError> {
        self.projects
            .get(name)
            .cloned()
            .ok_or(DirectoryError::UnknownProject { path })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputQuery {
    pub pretty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceQuery {
    pub tag: Option<String>,
    /// Comma-separated
    pub tags: Option<String>,
    pub startswith: Option<String>,
    pub endswith: Option<String>,
    pub contains: Option<String>,
    pub regex: Option<String>,
    pub dc: Option<String>,
    pub pretty: Option<String>,
}

impl From<ServiceQuery> for ListFilter {
    fn from(query: ServiceQuery) -> Self {
        let tags = query
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        ListFilter {
            tag: query.tag,
            tags,
            starts_with: query.startswith,
            ends_with: query.endswith,
            contains: query.contains,
            regex: query.regex,
            datacenter: query.dc,
        }
    }
}

fn is_pretty(flag: &Option<String>) -> bool {
    flag.as_deref().is_some_and(|v| !v.is_empty())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/resource", get(get_resource))
        .route("/resource/:project", get(get_project_resource))
        .route("/services", get(get_services))
        .route("/services/:project", get(get_project_services))
        .route("/heartbeat", get(heartbeat))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_resource(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<OutputQuery>,
) -> Result<Response, DirectoryError> {
    resource(&state.default, is_pretty(&query.pretty)).await
}

async fn get_project_resource(
    State(state): State<AppState>,
    Path(project): Path<String>,
    QueryParams(query): QueryParams<OutputQuery>,
) -> Result<Response, DirectoryError> {
    let scope = state.project(&project, format!("/resource/{}", project))?;
    resource(&scope, is_pretty(&query.pretty)).await
}

async fn get_services(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ServiceQuery>,
) -> Result<Response, DirectoryError> {
    service_list(&state.default, query).await
}

async fn get_project_services(
    State(state): State<AppState>,
    Path(project): Path<String>,
    QueryParams(query): QueryParams<ServiceQuery>,
) -> Result<Response, DirectoryError> {
    let scope = state.project(&project, format!("/services/{}", project))?;
    service_list(&scope, query).await
}

async fn heartbeat() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found(uri: Uri) -> ErrorEnvelope {
    ErrorEnvelope::new(StatusCode::NOT_FOUND, format!("Not found: '{}'", uri.path()))
}

async fn resource(scope: &Scope, pretty: bool) -> Result<Response, DirectoryError> {
    let records = directory::build(scope.catalog.as_ref(), &scope.config).await?;
    tracing::info!("Serving directory with {} nodes", records.len());
    Ok(json_response(&records, pretty))
}

async fn service_list(scope: &Scope, query: ServiceQuery) -> Result<Response, DirectoryError> {
    let pretty = is_pretty(&query.pretty);
    let filter = ListFilter::from(query);
    let names = services::list(scope.catalog.as_ref(), &scope.config, &filter).await?;
    Ok(json_response(&names, pretty))
}

/// Serialize `data` as a JSON body terminated by a newline.
/// Pretty output sorts object keys and indents by two spaces.
fn json_response<T: Serialize>(data: &T, pretty: bool) -> Response {
    let rendered = if pretty {
        serde_json::to_value(data).and_then(|value| serde_json::to_string_pretty(&sort_keys(value)))
    } else {
        serde_json::to_string(data)
    };

    match rendered {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body + "\n",
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to serialize response: {}", e);
            ErrorEnvelope::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to serialize response")
                .into_response()
        }
    }
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
