//! Error categories and the single place they become HTTP responses.
//!
//! Every response body uses one envelope: `{ success, message, data }` on
//! success and `{ success, message, errors }` on failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::AuthError;
use crate::models::{FieldViolation, ValidationFailure};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldViolation>),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    Conflict(String),
    #[error("subscription expired")]
    SubscriptionExpired,
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ValidationFailure> for ApiError {
    fn from(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::Invalid(violations) => ApiError::Validation(violations),
            schema @ ValidationFailure::Schema { .. } => ApiError::Internal(schema.into()),
        }
    }
}

/// Failure envelope shared by every error type that renders itself.
pub fn error_response(status: StatusCode, message: &str, errors: Value) -> Response {
    let body = Json(json!({
        "success": false,
        "message": message,
        "errors": errors,
    }));

    (status, body).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(violations) => {
                error_response(StatusCode::BAD_REQUEST, "Validation failed", json!(violations))
            }
            ApiError::MalformedBody(reason) => error_response(
                StatusCode::BAD_REQUEST,
                "Malformed request body",
                json!([{ "field": "body", "constraint": "json", "message": reason }]),
            ),
            ApiError::NotFound(entity) => {
                error_response(StatusCode::NOT_FOUND, &format!("{entity} not found"), json!([]))
            }
            ApiError::Auth(err) => err.into_response(),
            ApiError::Conflict(message) => error_response(StatusCode::CONFLICT, &message, json!([])),
            ApiError::SubscriptionExpired => {
                error_response(StatusCode::FORBIDDEN, "Subscription expired", json!([]))
            }
            ApiError::Persistence(err) => {
                tracing::error!(error = %err, "persistence failure");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", json!([]))
            }
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", json!([]))
            }
        }
    }
}

/// Success envelope.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    message: String,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": true,
            "message": self.message,
            "data": self.data,
        }));

        (self.status, body).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;
