//! Generic CRUD routes for the protocol components.

use axum::{
    extract::State,
    routing::get,
    Router,
};
use serde_json::{json, Value};

use super::{AppState, Pagination, ValidatedJson, ValidatedPath, ValidatedQuery};
use crate::auth::AccountSession;
use crate::error::{ApiResponse, ApiResult};
use crate::models::{Diet, Exercise, ExtraCompound, Food, HormonalProtocol, Hormone, Meal, Train, TrainDetails};
use crate::services::CrudResource;

/// Every component router, each under its own prefix.
pub fn component_routes() -> Router<AppState> {
    Router::new()
        .nest("/diet", crud_routes::<Diet>())
        .nest("/meal", crud_routes::<Meal>())
        .nest("/food", crud_routes::<Food>())
        .nest(
            "/train",
            crud_routes::<Train>().route("/protocol/:protocol_id", get(protocol_trains)),
        )
        .nest("/exercise", crud_routes::<Exercise>())
        .nest("/hormone", crud_routes::<Hormone>())
        .nest("/hormoneProtocol", crud_routes::<HormonalProtocol>())
        .nest("/extraCompound", crud_routes::<ExtraCompound>())
}

pub fn crud_routes<T: CrudResource>() -> Router<AppState> {
    Router::new()
        .route("/", get(list::<T>).post(create::<T>))
        .route("/:id", get(fetch::<T>).put(update::<T>).delete(remove::<T>))
}

#[tracing::instrument(skip(state), fields(resource = T::LABEL))]
async fn list<T: CrudResource>(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedQuery(pagination): ValidatedQuery<Pagination>,
) -> ApiResult<Vec<T::View>> {
    let items = state.resource_service.list::<T>(&session, pagination.window()).await?;
    Ok(ApiResponse::ok(format!("{} list retrieved", T::LABEL), items))
}

#[tracing::instrument(skip(state), fields(resource = T::LABEL))]
async fn fetch<T: CrudResource>(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
) -> ApiResult<T::View> {
    let item = state.resource_service.get::<T>(&session, &id).await?;
    Ok(ApiResponse::ok(format!("{} retrieved", T::LABEL), item))
}

#[tracing::instrument(skip(state, payload), fields(resource = T::LABEL))]
async fn create<T: CrudResource>(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedJson(payload): ValidatedJson<T::Create>,
) -> ApiResult<T::View> {
    let item = state.resource_service.create::<T>(&session, payload).await?;
    Ok(ApiResponse::created(format!("{} created", T::LABEL), item))
}

#[tracing::instrument(skip(state, payload), fields(resource = T::LABEL))]
async fn update<T: CrudResource>(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
    ValidatedJson(payload): ValidatedJson<T::Update>,
) -> ApiResult<T::View> {
    let item = state.resource_service.update::<T>(&session, &id, payload).await?;
    Ok(ApiResponse::ok(format!("{} updated", T::LABEL), item))
}

#[tracing::instrument(skip(state), fields(resource = T::LABEL))]
async fn remove<T: CrudResource>(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
) -> ApiResult<Value> {
    state.resource_service.delete::<T>(&session, &id).await?;
    Ok(ApiResponse::ok(format!("{} deleted", T::LABEL), json!({ "id": id })))
}

/// Trains of a protocol visible to the caller
#[tracing::instrument(skip(state))]
async fn protocol_trains(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(protocol_id): ValidatedPath<String>,
) -> ApiResult<Vec<TrainDetails>> {
    let trains = state.protocol_service.trains(&session, &protocol_id).await?;
    Ok(ApiResponse::ok("Trains retrieved", trains))
}
