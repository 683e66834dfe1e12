use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::auth::{AccountSession, AuthError, AuthService};
use crate::error::ApiError;
use crate::models::{Account, AccountProfile, Notification, Subscription, UpdateAccount};
use crate::store::{self, Entity, Filter, Page, Store, StoreError};

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    auth_service: AuthService,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, auth_service: AuthService) -> Self {
        Self { store, auth_service }
    }

    /// The caller followed by their clients.
    pub async fn list(&self, session: &AccountSession, page: Page) -> Result<Vec<AccountProfile>, ApiError> {
        let caller = self.account(&session.account_id).await?;
        let clients = self.clients(session, page).await?;

        let mut accounts = Vec::with_capacity(clients.len() + 1);
        accounts.push(AccountProfile::from(caller));
        accounts.extend(clients);
        Ok(accounts)
    }

    pub async fn clients(&self, session: &AccountSession, page: Page) -> Result<Vec<AccountProfile>, ApiError> {
        let filters = [Filter::equals("coachId", session.account_id.as_str())];
        let clients = store::list::<Account, _>(self.store.as_ref(), &filters, page).await?;

        Ok(clients.into_iter().map(AccountProfile::from).collect())
    }

    pub async fn clients_count(&self, session: &AccountSession) -> Result<u64, ApiError> {
        let filters = [Filter::equals("coachId", session.account_id.as_str())];

        Ok(self.store.count(Account::TABLE, &filters).await?)
    }

    /// Visible accounts: the caller, their clients and their coach.
    pub async fn get(&self, session: &AccountSession, id: &str) -> Result<AccountProfile, ApiError> {
        let account = self.account(id).await?;
        let caller = &session.account_id;

        let visible = account.id == *caller
            || account.coach_id.as_deref() == Some(caller.as_str())
            || self.account(caller).await?.coach_id.as_deref() == Some(id);

        if !visible {
            return Err(ApiError::NotFound("Account"));
        }

        Ok(account.into())
    }

    /// Updates the caller's own profile. A new activation key moves the
    /// account onto that subscription.
    pub async fn update(
        &self,
        session: &AccountSession,
        id: &str,
        request: UpdateAccount,
    ) -> Result<AccountProfile, ApiError> {
        if id != session.account_id {
            return Err(AuthError::InsufficientPermissions.into());
        }

        let password_hash = match &request.password {
            Some(password) => Some(self.auth_service.hash(password)?),
            None => None,
        };

        let id = id.to_string();
        let account = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let now = Utc::now();

                if let Some(key) = &request.activation_key {
                    let current = store::list_in::<Subscription>(
                        tx,
                        &[Filter::equals("accountId", id.as_str()), Filter::equals("active", true)],
                    )
                    .await?;
                    for previous in current {
                        let changes = store::to_row(&json!({ "active": false, "updatedAt": now }))?;
                        tx.update(Subscription::TABLE, &previous.id, changes).await?;
                    }

                    let changes = store::to_row(&json!({
                        "accountId": id,
                        "active": true,
                        "activatedAt": now,
                        "updatedAt": now,
                    }))?;
                    tx.update_where(Subscription::TABLE, key, &Subscription::unassigned_filters(), changes)
                        .await?
                        .ok_or(AuthError::InvalidActivationKey)?;
                }

                let mut changes = store::to_row(&request)?;
                if let Some(password_hash) = password_hash {
                    changes.insert("passwordHash".to_string(), json!(password_hash));
                }
                changes.insert("updatedAt".to_string(), json!(now));

                let row = tx
                    .update(Account::TABLE, &id, changes)
                    .await?
                    .ok_or(ApiError::NotFound("Account"))?;

                Ok::<_, ApiError>(store::from_row::<Account>(row)?)
            })
        })
        .await
        .map_err(|err| match err {
            ApiError::Persistence(StoreError::UniqueViolation(_)) => AuthError::EmailAlreadyExists.into(),
            ApiError::Persistence(StoreError::Conflict(_)) => AuthError::InvalidActivationKey.into(),
            other => other,
        })?;

        tracing::info!(account_id = %account.id, "account updated");
        Ok(account.into())
    }

    /// Deletes the caller's own account together with its notifications.
    ///
    /// Accounts that still own protocols or components cannot be deleted;
    /// the whole deletion is rolled back and reported as a conflict.
    pub async fn delete(&self, session: &AccountSession, id: &str) -> Result<(), ApiError> {
        if id != session.account_id {
            return Err(AuthError::InsufficientPermissions.into());
        }

        let id = id.to_string();
        store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                tx.delete_where(Notification::TABLE, &[Filter::equals("accountId", id.as_str())])
                    .await?;

                if !tx.delete(Account::TABLE, &id).await? {
                    return Err(ApiError::NotFound("Account"));
                }
                Ok::<_, ApiError>(())
            })
        })
        .await
        .map_err(|err| match err {
            ApiError::Persistence(StoreError::ForeignKey(detail)) => {
                tracing::info!(account_id = %session.account_id, detail = %detail, "account deletion blocked");
                ApiError::Conflict("Account still owns protocols or components".to_string())
            }
            other => other,
        })?;

        tracing::info!(account_id = %session.account_id, "account deleted");
        Ok(())
    }

    async fn account(&self, id: &str) -> Result<Account, ApiError> {
        store::find::<Account, _>(self.store.as_ref(), id)
            .await?
            .ok_or(ApiError::NotFound("Account"))
    }
}
