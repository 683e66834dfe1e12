// Business logic services

pub mod account_service;
pub mod assembly;
pub mod graph;
pub mod notification_service;
pub mod protocol_service;
pub mod resource_service;
pub mod subscription_service;

pub use account_service::AccountService;
pub use assembly::Assembly;
pub use notification_service::{
    NotificationError, NotificationOutbox, NotificationService, Notifier, OutboundNotification, OutboxWorker,
    StoreNotifier,
};
pub use protocol_service::ProtocolService;
pub use resource_service::{CrudResource, ResourceService};
pub use subscription_service::SubscriptionService;
