use chrono::{DateTime, Months, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::{Entity, Filter, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub price: f64,
    /// Length in months.
    pub duration: i32,
    pub account_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Plan {
    const TABLE: Table = Table::Plans;

    fn id(&self) -> &str {
        &self.id
    }
}

/// An activation key for a plan; bound to an account once redeemed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub plan_id: String,
    pub account_id: Option<String>,
    pub active: bool,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Subscription {
    const TABLE: Table = Table::Subscriptions;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Subscription {
    pub fn is_unassigned(&self) -> bool {
        self.account_id.is_none() && !self.active
    }

    /// Store filters equivalent to [`Subscription::is_unassigned`].
    pub fn unassigned_filters() -> [Filter; 2] {
        [Filter::equals("accountId", serde_json::Value::Null), Filter::equals("active", false)]
    }

    /// Activation time plus the plan's duration in months.
    pub fn expires_at(&self, plan: &Plan) -> Option<DateTime<Utc>> {
        let months = u32::try_from(plan.duration).ok()?;
        self.activated_at?.checked_add_months(Months::new(months))
    }

    pub fn is_expired(&self, plan: &Plan, now: DateTime<Utc>) -> bool {
        match self.expires_at(plan) {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    pub subscription: Subscription,
    pub plan: Plan,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlan {
    #[schemars(length(min = 1))]
    pub name: String,
    #[schemars(range(min = 0))]
    pub price: f64,
    #[schemars(range(min = 1))]
    pub duration: i32,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscription {
    #[schemars(length(min = 1))]
    pub plan_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSubscription {
    #[schemars(length(min = 1))]
    pub plan_id: String,
}
