use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::models::{validation, FieldViolation};
use crate::store::Page;

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

/// JSON body checked against the schema of `T` before deserialization.
///
/// Unparsable bodies are rejected as malformed; schema violations are
/// reported all at once with their field paths.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: JsonSchema + DeserializeOwned + Send + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<Value>::from_request(request, state)
            .await
            .map_err(|rejection| ApiError::MalformedBody(rejection.body_text()))?;

        Ok(Self(validation::parse::<T>(body)?))
    }
}

/// Query string checked against the schema of `T`.
///
/// Numeric-looking values are read as numbers, everything else as strings,
/// so `?page=abc` is reported against `page`.
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: JsonSchema + DeserializeOwned + Send + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|rejection| rejected("query", rejection.body_text()))?;

        let fields: Map<String, Value> = pairs
            .into_iter()
            .map(|(key, raw)| (key, query_value(raw)))
            .collect();

        Ok(Self(validation::parse::<T>(Value::Object(fields))?))
    }
}

fn query_value(raw: String) -> Value {
    match serde_json::from_str::<Value>(&raw) {
        Ok(number @ Value::Number(_)) => number,
        _ => Value::String(raw),
    }
}

/// Path parameters whose rejections use the error envelope.
#[derive(Debug)]
pub struct ValidatedPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| rejected("path", rejection.body_text()))?;

        Ok(Self(value))
    }
}

fn rejected(field: &str, message: String) -> ApiError {
    ApiError::Validation(vec![FieldViolation {
        field: field.to_string(),
        constraint: "type".to_string(),
        message,
        received: None,
    }])
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based page number (default: 1)
    pub page: Option<u64>,
    /// Items per page (default: 10, max: 100)
    pub page_size: Option<u64>,
}

impl Pagination {
    pub fn get_page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn get_page_size(&self) -> u64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn window(&self) -> Page {
        let take = self.get_page_size();

        Page {
            skip: (self.get_page() - 1).saturating_mul(take),
            take,
        }
    }
}
