use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::accounts::account_routes;
use super::auth::auth_routes;
use super::dashboard::dashboard_routes;
use super::health::health_check;
use super::notifications::notification_routes;
use super::protocols::protocol_routes;
use super::resources::component_routes;
use super::subscriptions::{plan_routes, subscription_routes};
use super::AppState;
use crate::auth::{cors_layer, jwt_auth_middleware, security_headers_layer};

/// Full application router. Everything but health, register and login
/// requires a bearer token.
pub fn create_routes(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/account", account_routes())
        .nest("/protocol", protocol_routes())
        .merge(component_routes())
        .nest("/plan", plan_routes())
        .nest("/subscription", subscription_routes())
        .nest("/notification", notification_routes())
        .nest("/dashboard", dashboard_routes())
        .route_layer(middleware::from_fn_with_state(
            state.auth_service.clone(),
            jwt_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes(&state))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(security_headers_layer())
        .layer(cors_layer())
        .with_state(state)
}
