use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::auth::AccountSession;
use crate::error::ApiError;
use crate::models::{new_id, Account, Notification};
use crate::store::{self, Entity, Filter, Page, Store, StoreError};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("unknown recipient {0}")]
    UnknownRecipient(String),
    #[error("notification store failure: {0}")]
    Store(#[from] StoreError),
}

/// Delivers one notification to an account.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str, recipient: &str) -> Result<Notification, NotificationError>;
}

/// Persists notifications so recipients can read them later.
#[derive(Clone)]
pub struct StoreNotifier {
    store: Arc<dyn Store>,
}

impl StoreNotifier {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Notifier for StoreNotifier {
    async fn notify(&self, title: &str, message: &str, recipient: &str) -> Result<Notification, NotificationError> {
        if store::find::<Account, _>(self.store.as_ref(), recipient).await?.is_none() {
            return Err(NotificationError::UnknownRecipient(recipient.to_string()));
        }

        let now = Utc::now();
        let notification = Notification {
            id: new_id(),
            account_id: recipient.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            read: false,
            created_at: now,
            updated_at: now,
        };

        let stored = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move { store::insert(tx, &notification).await })
        })
        .await
        .map_err(|err| match err {
            StoreError::ForeignKey(_) => NotificationError::UnknownRecipient(recipient.to_string()),
            other => NotificationError::Store(other),
        })?;

        Ok(stored)
    }
}

/// A notification waiting to be delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundNotification {
    pub recipient: String,
    pub title: String,
    pub message: String,
}

impl OutboundNotification {
    pub fn new(recipient: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Sending half of the notification queue.
///
/// Publishing never blocks and never fails the caller, so it is safe to call
/// right after a commit.
#[derive(Clone, Debug)]
pub struct NotificationOutbox {
    sender: mpsc::UnboundedSender<OutboundNotification>,
}

impl NotificationOutbox {
    pub fn channel(notifier: Arc<dyn Notifier>) -> (Self, OutboxWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();

        (Self { sender }, OutboxWorker { receiver, notifier })
    }

    pub fn publish(&self, notification: OutboundNotification) {
        if let Err(err) = self.sender.send(notification) {
            tracing::warn!(recipient = %err.0.recipient, "notification outbox closed, dropping notification");
        }
    }
}

/// Receiving half of the queue; hands every notification to the notifier.
pub struct OutboxWorker {
    receiver: mpsc::UnboundedReceiver<OutboundNotification>,
    notifier: Arc<dyn Notifier>,
}

impl OutboxWorker {
    /// Delivers until every outbox handle has been dropped.
    pub async fn run(mut self) {
        tracing::info!("Notification outbox worker started");

        while let Some(notification) = self.receiver.recv().await {
            self.deliver(notification).await;
        }

        tracing::info!("Notification outbox worker stopped");
    }

    /// Delivers whatever is queued right now and returns how many were handled.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;

        while let Ok(notification) = self.receiver.try_recv() {
            self.deliver(notification).await;
            handled += 1;
        }

        handled
    }

    async fn deliver(&self, notification: OutboundNotification) {
        match self
            .notifier
            .notify(&notification.title, &notification.message, &notification.recipient)
            .await
        {
            Ok(delivered) => {
                tracing::info!(notification_id = %delivered.id, recipient = %delivered.account_id, "notification delivered");
            }
            Err(err) => {
                tracing::warn!(recipient = %notification.recipient, error = %err, "notification delivery failed");
            }
        }
    }
}

/// Notification inbox operations for the caller.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn Store>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self, session: &AccountSession, page: Page) -> Result<Vec<Notification>, ApiError> {
        let filters = [Filter::equals("accountId", session.account_id.as_str())];

        Ok(store::list(self.store.as_ref(), &filters, page).await?)
    }

    pub async fn mark_read(&self, session: &AccountSession, id: &str, read: bool) -> Result<Notification, ApiError> {
        self.owned(session, id).await?;

        let id = id.to_string();
        let changes = json!({ "read": read, "updatedAt": Utc::now() });

        store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let changes = store::to_row(&changes)?;
                match tx.update(Notification::TABLE, &id, changes).await? {
                    Some(row) => Ok(store::from_row(row)?),
                    None => Err(ApiError::NotFound("Notification")),
                }
            })
        })
        .await
    }

    pub async fn delete(&self, session: &AccountSession, id: &str) -> Result<(), ApiError> {
        self.owned(session, id).await?;

        let id = id.to_string();
        store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                tx.delete(Notification::TABLE, &id).await?;
                Ok(())
            })
        })
        .await
    }

    async fn owned(&self, session: &AccountSession, id: &str) -> Result<Notification, ApiError> {
        store::find::<Notification, _>(self.store.as_ref(), id)
            .await?
            .filter(|notification| notification.account_id == session.account_id)
            .ok_or(ApiError::NotFound("Notification"))
    }
}
