use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use shared::protocol::ERROR_STATUS;

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Failures surfaced by the directory and the service lister.
///
/// Nothing here is retried; the HTTP layer maps each variant to a status
/// code and an error envelope.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Connection to Consul at {endpoint} failed")]
    Connectivity {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx answer from the catalog; status and body are passed through.
    #[error("{body}")]
    CatalogProtocol { status: u16, body: String },

    #[error("Unexpected response from Consul at {endpoint}: {reason}")]
    CatalogDecode { endpoint: String, reason: String },

    #[error("Invalid query string: {reason}")]
    InvalidQuery { reason: String },

    #[error("Not found: '{path}'")]
    UnknownProject { path: String },

    #[error("Invalid regex '{pattern}': {source}")]
    FilterCompile {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl DirectoryError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::CatalogProtocol { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::UnknownProject { .. } => StatusCode::NOT_FOUND,
            Self::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            // Malformed patterns report as 500, not 400.
            Self::FilterCompile { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Connectivity { .. } | Self::CatalogDecode { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error envelope returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub status: &'static str,
    pub code: u16,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: ERROR_STATUS,
            code: status.as_u16(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match serde_json::to_string(&self) {
            Ok(json) => json + "\n",
            Err(_) => String::from("{\"status\":\"error\",\"code\":500,\"message\":\"\"}\n"),
        };
        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

impl IntoResponse for DirectoryError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            match std::error::Error::source(&self) {
                Some(cause) => tracing::error!("Request failed: {}: {}", self, cause),
                None => tracing::error!("Request failed: {}", self),
            }
        } else {
            tracing::warn!("Request rejected: {}", self);
        }
        ErrorEnvelope::new(status, self.to_string()).into_response()
    }
}
