use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::auth::AccountSession;
use crate::error::ApiError;
use crate::models::{
    new_id, Account, ChangeSubscription, CreatePlan, CreateSubscription, Plan, Subscription, SubscriptionStatus,
};
use crate::store::{self, Entity, Filter, Page, Store, StoreError};

/// Plan catalog and subscription (activation key) lifecycle.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn Store>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list_plans(&self, page: Page) -> Result<Vec<Plan>, ApiError> {
        Ok(store::list(self.store.as_ref(), &[], page).await?)
    }

    pub async fn get_plan(&self, id: &str) -> Result<Plan, ApiError> {
        store::find::<Plan, _>(self.store.as_ref(), id)
            .await?
            .ok_or(ApiError::NotFound("Plan"))
    }

    pub async fn create_plan(&self, session: &AccountSession, request: CreatePlan) -> Result<Plan, ApiError> {
        let now = Utc::now();
        let plan = Plan {
            id: new_id(),
            name: request.name,
            price: request.price,
            duration: request.duration,
            account_id: Some(session.account_id.clone()),
            created_at: now,
            updated_at: now,
        };

        let plan = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move { Ok::<_, ApiError>(store::insert(tx, &plan).await?) })
        })
        .await?;

        tracing::info!(plan_id = %plan.id, "plan created");
        Ok(plan)
    }

    /// Only the plan's creator may delete it, and only while no subscription uses it.
    pub async fn delete_plan(&self, session: &AccountSession, id: &str) -> Result<(), ApiError> {
        let plan = self.get_plan(id).await?;
        if plan.account_id.as_deref() != Some(session.account_id.as_str()) {
            return Err(ApiError::NotFound("Plan"));
        }

        let id = id.to_string();
        store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                tx.delete(Plan::TABLE, &id).await?;
                Ok::<_, ApiError>(())
            })
        })
        .await
        .map_err(|err| match err {
            ApiError::Persistence(StoreError::ForeignKey(_)) => {
                ApiError::Conflict("Plan still has subscriptions".to_string())
            }
            other => other,
        })
    }

    pub async fn list(&self, session: &AccountSession, page: Page) -> Result<Vec<Subscription>, ApiError> {
        let filters = [Filter::equals("accountId", session.account_id.as_str())];

        Ok(store::list(self.store.as_ref(), &filters, page).await?)
    }

    /// Issues a new, unassigned activation key for a plan.
    pub async fn create(&self, request: CreateSubscription) -> Result<Subscription, ApiError> {
        self.get_plan(&request.plan_id).await?;

        let now = Utc::now();
        let subscription = Subscription {
            id: new_id(),
            plan_id: request.plan_id,
            account_id: None,
            active: false,
            activated_at: None,
            created_at: now,
            updated_at: now,
        };

        let subscription = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move { Ok::<_, ApiError>(store::insert(tx, &subscription).await?) })
        })
        .await?;

        tracing::info!(subscription_id = %subscription.id, plan_id = %subscription.plan_id, "activation key issued");
        Ok(subscription)
    }

    /// Visible when it belongs to the caller or is still unassigned.
    pub async fn get(&self, session: &AccountSession, id: &str) -> Result<SubscriptionStatus, ApiError> {
        let subscription = store::find::<Subscription, _>(self.store.as_ref(), id)
            .await?
            .filter(|subscription| {
                subscription.account_id.is_none()
                    || subscription.account_id.as_deref() == Some(session.account_id.as_str())
            })
            .ok_or(ApiError::NotFound("Subscription"))?;

        self.status(subscription).await
    }

    /// Checks the subscription that grants the caller access: their own for
    /// coaches, their coach's for customers.
    pub async fn verify(&self, session: &AccountSession) -> Result<SubscriptionStatus, ApiError> {
        let holder = if session.is_coach() {
            session.account_id.clone()
        } else {
            store::find::<Account, _>(self.store.as_ref(), &session.account_id)
                .await?
                .and_then(|account| account.coach_id)
                .ok_or(ApiError::NotFound("Subscription"))?
        };

        let status = self.active_status(&holder).await?.ok_or(ApiError::NotFound("Subscription"))?;
        if expired(&status, Utc::now()) {
            return Err(ApiError::SubscriptionExpired);
        }

        Ok(status)
    }

    /// Deactivates the caller's current subscription and activates a new one on `planId`.
    pub async fn change(&self, session: &AccountSession, request: ChangeSubscription) -> Result<SubscriptionStatus, ApiError> {
        let plan = self.get_plan(&request.plan_id).await?;
        let account_id = session.account_id.clone();

        let subscription = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let now = Utc::now();
                let current = store::list_in::<Subscription>(
                    tx,
                    &[Filter::equals("accountId", account_id.as_str()), Filter::equals("active", true)],
                )
                .await?;

                for previous in current {
                    let changes = store::to_row(&json!({ "active": false, "updatedAt": now }))?;
                    tx.update(Subscription::TABLE, &previous.id, changes).await?;
                }

                let subscription = Subscription {
                    id: new_id(),
                    plan_id: request.plan_id,
                    account_id: Some(account_id),
                    active: true,
                    activated_at: Some(now),
                    created_at: now,
                    updated_at: now,
                };
                Ok::<_, ApiError>(store::insert(tx, &subscription).await?)
            })
        })
        .await?;

        tracing::info!(subscription_id = %subscription.id, plan_id = %plan.id, "subscription changed");

        Ok(SubscriptionStatus {
            expires_at: subscription.expires_at(&plan),
            subscription,
            plan,
        })
    }

    pub async fn delete(&self, session: &AccountSession, id: &str) -> Result<(), ApiError> {
        let subscription = store::find::<Subscription, _>(self.store.as_ref(), id)
            .await?
            .filter(|subscription| subscription.account_id.as_deref() == Some(session.account_id.as_str()))
            .ok_or(ApiError::NotFound("Subscription"))?;

        store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                tx.delete(Subscription::TABLE, &subscription.id).await?;
                Ok::<_, ApiError>(())
            })
        })
        .await
    }

    async fn active_status(&self, account_id: &str) -> Result<Option<SubscriptionStatus>, ApiError> {
        let filters = [Filter::equals("accountId", account_id), Filter::equals("active", true)];
        let active = store::list::<Subscription, _>(self.store.as_ref(), &filters, Page::all()).await?;

        match active.into_iter().max_by_key(|subscription| subscription.activated_at) {
            Some(subscription) => Ok(Some(self.status(subscription).await?)),
            None => Ok(None),
        }
    }

    async fn status(&self, subscription: Subscription) -> Result<SubscriptionStatus, ApiError> {
        let plan = self.get_plan(&subscription.plan_id).await?;

        Ok(SubscriptionStatus {
            expires_at: subscription.expires_at(&plan),
            subscription,
            plan,
        })
    }
}

fn expired(status: &SubscriptionStatus, now: DateTime<Utc>) -> bool {
    status.subscription.is_expired(&status.plan, now)
}
