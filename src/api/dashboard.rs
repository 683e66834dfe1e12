use axum::{extract::State, routing::get, Router};
use serde_json::{json, Value};

use super::AppState;
use crate::auth::AccountSession;
use crate::error::{ApiResponse, ApiResult};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/protocolCount", get(protocol_count))
        .route("/clientsCount", get(clients_count))
}

#[tracing::instrument(skip(state))]
async fn protocol_count(State(state): State<AppState>, session: AccountSession) -> ApiResult<Value> {
    let count = state.protocol_service.count(&session).await?;
    Ok(ApiResponse::ok("Protocol count retrieved", json!({ "count": count })))
}

#[tracing::instrument(skip(state))]
async fn clients_count(State(state): State<AppState>, session: AccountSession) -> ApiResult<Value> {
    let count = state.account_service.clients_count(&session).await?;
    Ok(ApiResponse::ok("Clients count retrieved", json!({ "count": count })))
}
