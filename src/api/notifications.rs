use axum::{
    extract::State,
    routing::{get, put},
    Router,
};
use serde_json::{json, Value};

use super::{AppState, Pagination, ValidatedJson, ValidatedPath, ValidatedQuery};
use crate::auth::AccountSession;
use crate::error::{ApiResponse, ApiResult};
use crate::models::{Notification, UpdateNotification};

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/:id", put(mark_notification).delete(delete_notification))
}

/// Caller's inbox, in arrival order
#[tracing::instrument(skip(state))]
async fn list_notifications(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedQuery(pagination): ValidatedQuery<Pagination>,
) -> ApiResult<Vec<Notification>> {
    let notifications = state.notification_service.list(&session, pagination.window()).await?;
    Ok(ApiResponse::ok("Notifications retrieved", notifications))
}

#[tracing::instrument(skip(state, request))]
async fn mark_notification(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
    ValidatedJson(request): ValidatedJson<UpdateNotification>,
) -> ApiResult<Notification> {
    let notification = state.notification_service.mark_read(&session, &id, request.read).await?;
    Ok(ApiResponse::ok("Notification updated", notification))
}

#[tracing::instrument(skip(state))]
async fn delete_notification(
    State(state): State<AppState>,
    session: AccountSession,
    ValidatedPath(id): ValidatedPath<String>,
) -> ApiResult<Value> {
    state.notification_service.delete(&session, &id).await?;
    Ok(ApiResponse::ok("Notification deleted", json!({ "id": id })))
}
