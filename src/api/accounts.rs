use axum::{
    extract::State,
    routing::get,
    Router,
};
use serde_json::{json, Value};

use super::{AppState, Pagination, ValidatedJson, ValidatedPath, ValidatedQuery};
use crate::auth::AccountSession;
use crate::error::{ApiResponse, ApiResult};
use crate::models::{AccountProfile, UpdateAccount};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_accounts))
        .route("/clients", get(list_clients))
        .route("/:id", get(get_account).put(update_account).delete(delete_account))
}

/// The caller followed by their clients
#[tracing::instrument(skip(state))]
async fn list_accounts(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedQuery(pagination): ValidatedQuery<Pagination>,
) -> ApiResult<Vec<AccountProfile>> {
    let accounts = state.account_service.list(&session, pagination.window()).await?;
    Ok(ApiResponse::ok("Accounts retrieved", accounts))
}

#[tracing::instrument(skip(state))]
async fn list_clients(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedQuery(pagination): ValidatedQuery<Pagination>,
) -> ApiResult<Vec<AccountProfile>> {
    let clients = state.account_service.clients(&session, pagination.window()).await?;
    Ok(ApiResponse::ok("Clients retrieved", clients))
}

#[tracing::instrument(skip(state))]
async fn get_account(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
) -> ApiResult<AccountProfile> {
    let account = state.account_service.get(&session, &id).await?;
    Ok(ApiResponse::ok("Account retrieved", account))
}

#[tracing::instrument(skip(state, request))]
async fn update_account(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
    ValidatedJson(request): ValidatedJson<UpdateAccount>,
) -> ApiResult<AccountProfile> {
    let account = state.account_service.update(&session, &id, request).await?;
    Ok(ApiResponse::ok("Account updated", account))
}

#[tracing::instrument(skip(state))]
async fn delete_account(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
) -> ApiResult<Value> {
    state.account_service.delete(&session, &id).await?;
    Ok(ApiResponse::ok("Account deleted", json!({ "id": id })))
}
