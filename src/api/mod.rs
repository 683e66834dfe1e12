//! HTTP surface: shared state, extractors and one router per resource.

pub mod accounts;
pub mod auth;
pub mod dashboard;
pub mod extract;
pub mod health;
pub mod notifications;
pub mod protocols;
pub mod resources;
pub mod routes;
pub mod subscriptions;

use std::sync::Arc;

use crate::auth::{AuthService, JwtService};
use crate::config::AppConfig;
use crate::services::{
    AccountService, NotificationOutbox, NotificationService, Notifier, OutboxWorker, ProtocolService,
    ResourceService, StoreNotifier, SubscriptionService,
};
use crate::store::Store;

pub use extract::{Pagination, ValidatedJson, ValidatedPath, ValidatedQuery};
pub use routes::create_routes;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth_service: AuthService,
    pub account_service: AccountService,
    pub protocol_service: ProtocolService,
    pub resource_service: ResourceService,
    pub subscription_service: SubscriptionService,
    pub notification_service: NotificationService,
}

impl AppState {
    /// Wires every service over `store`, delivering notifications through the store.
    ///
    /// The returned worker must be driven (`run` or `drain`) for notifications
    /// to be delivered.
    pub fn new(store: Arc<dyn Store>, config: &AppConfig) -> (Self, OutboxWorker) {
        let notifier: Arc<dyn Notifier> = Arc::new(StoreNotifier::new(store.clone()));
        Self::with_notifier(store, config, notifier)
    }

    pub fn with_notifier(store: Arc<dyn Store>, config: &AppConfig, notifier: Arc<dyn Notifier>) -> (Self, OutboxWorker) {
        let (outbox, worker) = NotificationOutbox::channel(notifier);

        let jwt_service = JwtService::new(&config.jwt_secret, config.jwt_ttl_hours);
        let auth_service = AuthService::new(store.clone(), jwt_service, outbox.clone(), config.bcrypt_cost);

        let state = Self {
            account_service: AccountService::new(store.clone(), auth_service.clone()),
            protocol_service: ProtocolService::new(store.clone(), outbox),
            resource_service: ResourceService::new(store.clone()),
            subscription_service: SubscriptionService::new(store.clone()),
            notification_service: NotificationService::new(store.clone()),
            auth_service,
            store,
        };

        (state, worker)
    }
}
