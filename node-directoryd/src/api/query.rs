use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use crate::error::DirectoryError;

/// Query string extractor that keeps the last value of a repeated key.
///
/// Rejections surface as `DirectoryError` so they render as the JSON
/// error envelope.
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = DirectoryError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| DirectoryError::InvalidQuery {
                reason: rejection.body_text(),
            })?;

        // Later pairs overwrite earlier ones
        let params: Map<String, Value> = pairs
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();

        serde_json::from_value(Value::Object(params))
            .map(QueryParams)
            .map_err(|e| DirectoryError::InvalidQuery {
                reason: e.to_string(),
            })
    }
}
