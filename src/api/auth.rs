use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Router,
};

use super::{AppState, ValidatedJson};
use crate::auth::{jwt_auth_middleware, AccountSession, AuthResponse, LoginRequest, RegisterRequest};
use crate::error::{ApiResponse, ApiResult};
use crate::models::AccountProfile;

/// Authentication routes. Only `/verify` needs a token.
pub fn auth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route(
            "/verify",
            get(verify).route_layer(middleware::from_fn_with_state(
                state.auth_service.clone(),
                jwt_auth_middleware,
            )),
        )
}

/// Register a new account
#[tracing::instrument(skip(state, request))]
async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    let response = state.auth_service.register(request).await?;
    Ok(ApiResponse::created("Account registered", response))
}

/// Login
#[tracing::instrument(skip(state, request))]
async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let response = state.auth_service.login(request).await?;
    Ok(ApiResponse::ok("Login successful", response))
}

/// Profile behind the presented token
#[tracing::instrument(skip(state))]
async fn verify(State(state): State<AppState>, session: AccountSession) -> ApiResult<AccountProfile> {
    let profile = state.auth_service.verify(&session).await?;
    Ok(ApiResponse::ok("Token is valid", profile))
}
