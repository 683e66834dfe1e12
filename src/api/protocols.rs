use axum::{
    extract::State,
    middleware,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};

use super::{AppState, Pagination, ValidatedJson, ValidatedPath, ValidatedQuery};
use crate::auth::{coach_only_middleware, AccountSession};
use crate::error::{ApiResponse, ApiResult};
use crate::models::{CreateProtocol, FullProtocolRequest, ProtocolDetails, ProtocolOverview, UpdateProtocol};

/// Protocol routes. Reads are open to owner and client, writes to coaches.
pub fn protocol_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/createFullProtocol",
            post(create_full_protocol).route_layer(middleware::from_fn(coach_only_middleware)),
        )
        .route(
            "/",
            get(list_protocols)
                .merge(post(create_protocol).route_layer(middleware::from_fn(coach_only_middleware))),
        )
        .route("/count/number", get(count_protocols))
        .route("/clients/:client_id", get(client_protocol))
        .route(
            "/:id",
            get(get_protocol).merge(
                put(update_protocol)
                    .delete(delete_protocol)
                    .route_layer(middleware::from_fn(coach_only_middleware)),
            ),
        )
}

/// Create a protocol together with every nested component
#[tracing::instrument(skip(state, request))]
async fn create_full_protocol(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedJson(request): ValidatedJson<FullProtocolRequest>,
) -> ApiResult<ProtocolDetails> {
    let protocol = state.protocol_service.create_full_protocol(&session, request).await?;
    Ok(ApiResponse::created("Full protocol created", protocol))
}

/// Create a protocol from components that already exist
#[tracing::instrument(skip(state, request))]
async fn create_protocol(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedJson(request): ValidatedJson<CreateProtocol>,
) -> ApiResult<ProtocolDetails> {
    let protocol = state.protocol_service.create(&session, request).await?;
    Ok(ApiResponse::created("Protocol created", protocol))
}

#[tracing::instrument(skip(state))]
async fn list_protocols(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedQuery(pagination): ValidatedQuery<Pagination>,
) -> ApiResult<Vec<ProtocolOverview>> {
    let protocols = state.protocol_service.list(&session, pagination.window()).await?;
    Ok(ApiResponse::ok("Protocols retrieved", protocols))
}

#[tracing::instrument(skip(state))]
async fn get_protocol(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
) -> ApiResult<ProtocolDetails> {
    let protocol = state.protocol_service.get(&session, &id).await?;
    Ok(ApiResponse::ok("Protocol retrieved", protocol))
}

/// Latest protocol assigned to a client
#[tracing::instrument(skip(state))]
async fn client_protocol(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(client_id): ValidatedPath<String>,
) -> ApiResult<ProtocolDetails> {
    let protocol = state.protocol_service.by_client(&session, &client_id).await?;
    Ok(ApiResponse::ok("Protocol retrieved", protocol))
}

#[tracing::instrument(skip(state))]
async fn count_protocols(State(state): State<AppState>, session: AccountSession) -> ApiResult<Value> {
    let count = state.protocol_service.count(&session).await?;
    Ok(ApiResponse::ok("Protocols counted", json!({ "count": count })))
}

#[tracing::instrument(skip(state, request))]
async fn update_protocol(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
    ValidatedJson(request): ValidatedJson<UpdateProtocol>,
) -> ApiResult<ProtocolDetails> {
    let protocol = state.protocol_service.update(&session, &id, request).await?;
    Ok(ApiResponse::ok("Protocol updated", protocol))
}

#[tracing::instrument(skip(state))]
async fn delete_protocol(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
) -> ApiResult<Value> {
    state.protocol_service.delete(&session, &id).await?;
    Ok(ApiResponse::ok("Protocol deleted", json!({ "id": id })))
}
