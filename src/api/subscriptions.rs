use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use super::{AppState, Pagination, ValidatedJson, ValidatedPath, ValidatedQuery};
use crate::auth::AccountSession;
use crate::error::{ApiResponse, ApiResult};
use crate::models::{ChangeSubscription, CreatePlan, CreateSubscription, Plan, Subscription, SubscriptionStatus};

pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/:id", get(get_plan).delete(delete_plan))
}

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route("/verify", get(verify_subscription))
        .route("/change", post(change_subscription))
        .route("/:id", get(get_subscription).delete(delete_subscription))
}

#[tracing::instrument(skip(state))]
async fn list_plans(State(state): State<AppState>, ValidatedQuery(pagination): ValidatedQuery<Pagination>) -> ApiResult<Vec<Plan>> {
    let plans = state.subscription_service.list_plans(pagination.window()).await?;
    Ok(ApiResponse::ok("Plans retrieved", plans))
}

#[tracing::instrument(skip(state))]
async fn get_plan(State(state): State<AppState>, ValidatedPath(id): ValidatedPath<String>) -> ApiResult<Plan> {
    let plan = state.subscription_service.get_plan(&id).await?;
    Ok(ApiResponse::ok("Plan retrieved", plan))
}

#[tracing::instrument(skip(state, request))]
async fn create_plan(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedJson(request): ValidatedJson<CreatePlan>,
) -> ApiResult<Plan> {
    let plan = state.subscription_service.create_plan(&session, request).await?;
    Ok(ApiResponse::created("Plan created", plan))
}

#[tracing::instrument(skip(state))]
async fn delete_plan(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
) -> ApiResult<Value> {
    state.subscription_service.delete_plan(&session, &id).await?;
    Ok(ApiResponse::ok("Plan deleted", json!({ "id": id })))
}

#[tracing::instrument(skip(state))]
async fn list_subscriptions(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedQuery(pagination): ValidatedQuery<Pagination>,
) -> ApiResult<Vec<Subscription>> {
    let subscriptions = state.subscription_service.list(&session, pagination.window()).await?;
    Ok(ApiResponse::ok("Subscriptions retrieved", subscriptions))
}

/// Issue a new activation key
#[tracing::instrument(skip(state, request))]
async fn create_subscription(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateSubscription>,
) -> ApiResult<Subscription> {
    let subscription = state.subscription_service.create(request).await?;
    Ok(ApiResponse::created("Subscription created", subscription))
}

#[tracing::instrument(skip(state))]
async fn get_subscription(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
) -> ApiResult<SubscriptionStatus> {
    let status = state.subscription_service.get(&session, &id).await?;
    Ok(ApiResponse::ok("Subscription retrieved", status))
}

/// Check that the subscription granting access is still valid
#[tracing::instrument(skip(state))]
async fn verify_subscription(State(state): State<AppState>, session: AccountSession) -> ApiResult<SubscriptionStatus> {
    let status = state.subscription_service.verify(&session).await?;
    Ok(ApiResponse::ok("Subscription is active", status))
}

#[tracing::instrument(skip(state, request))]
async fn change_subscription(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedJson(request): ValidatedJson<ChangeSubscription>,
) -> ApiResult<SubscriptionStatus> {
    let status = state.subscription_service.change(&session, request).await?;
    Ok(ApiResponse::ok("Subscription changed", status))
}

#[tracing::instrument(skip(state))]
async fn delete_subscription(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
) -> ApiResult<Value> {
    state.subscription_service.delete(&session, &id).await?;
    Ok(ApiResponse::ok("Subscription deleted", json!({ "id": id })))
}
