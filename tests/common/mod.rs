//! Shared harness: the full router over an in-memory store with a seeded
//! coach, a client, a second coach and an active subscription.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use mockall::mock;
use serde_json::Value;
use tower::ServiceExt;

use iron_atlas::api::{create_routes, AppState};
use iron_atlas::auth::{password, JwtService};
use iron_atlas::config::AppConfig;
use iron_atlas::models::{Account, AccountType, Notification, Plan, Subscription};
use iron_atlas::services::{NotificationError, Notifier, OutboxWorker};
use iron_atlas::store::{self, MemoryStore, Store, Table};

pub const PASSWORD: &str = "Str0ng!Pass";
pub const COACH: &str = "coach-1";
pub const CLIENT: &str = "cust-1";
pub const OTHER_COACH: &str = "coach-2";
pub const OTHER_CLIENT: &str = "cust-2";
pub const PLAN: &str = "plan-1";
pub const SUBSCRIPTION: &str = "sub-1";
pub const UNUSED_KEY: &str = "key-1";

mock! {
    pub Notifier {}

    #[async_trait]
    impl Notifier for Notifier {
        async fn notify(&self, title: &str, message: &str, recipient: &str) -> Result<Notification, NotificationError>;
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub worker: OutboxWorker,
    pub jwt: JwtService,
}

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: "test_secret_key_for_testing_only".to_string(),
        bcrypt_cost: 4,
        ..AppConfig::default()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let (state, worker) = AppState::new(Arc::new(store.clone()), &test_config());
        Self::build(store, state, worker).await
    }

    pub async fn with_notifier(notifier: impl Notifier + 'static) -> Self {
        let store = MemoryStore::new();
        let (state, worker) = AppState::with_notifier(Arc::new(store.clone()), &test_config(), Arc::new(notifier));
        Self::build(store, state, worker).await
    }

    async fn build(store: MemoryStore, state: AppState, worker: OutboxWorker) -> Self {
        let config = test_config();
        let app = Self {
            router: create_routes(state),
            store,
            worker,
            jwt: JwtService::new(&config.jwt_secret, config.jwt_ttl_hours),
        };
        app.seed().await;
        app
    }

    async fn seed(&self) {
        let hash = password::hash_password(PASSWORD, 4).unwrap();

        for (id, account_type, coach_id) in [
            (COACH, AccountType::Coach, None),
            (OTHER_COACH, AccountType::Coach, None),
            (CLIENT, AccountType::Customer, Some(COACH)),
            (OTHER_CLIENT, AccountType::Customer, Some(OTHER_COACH)),
        ] {
            let now = Utc::now();
            let account = Account {
                id: id.to_string(),
                name: id.to_string(),
                email: email_of(id),
                password_hash: hash.clone(),
                account_type,
                coach_id: coach_id.map(str::to_string),
                account_image_url: None,
                created_at: now,
                updated_at: now,
            };
            self.store.seed(Table::Accounts, store::to_row(&account).unwrap()).await.unwrap();
        }

        let now = Utc::now();
        let plan = Plan {
            id: PLAN.to_string(),
            name: "Monthly".to_string(),
            price: 49.9,
            duration: 1,
            account_id: Some(COACH.to_string()),
            created_at: now,
            updated_at: now,
        };
        self.store.seed(Table::Plans, store::to_row(&plan).unwrap()).await.unwrap();

        for (id, account_id) in [(SUBSCRIPTION, Some(COACH)), (UNUSED_KEY, None)] {
            let subscription = Subscription {
                id: id.to_string(),
                plan_id: PLAN.to_string(),
                account_id: account_id.map(str::to_string),
                active: account_id.is_some(),
                activated_at: account_id.map(|_| now),
                created_at: now,
                updated_at: now,
            };
            self.store
                .seed(Table::Subscriptions, store::to_row(&subscription).unwrap())
                .await
                .unwrap();
        }
    }

    pub fn token(&self, account_id: &str) -> String {
        let account_type = if account_id.starts_with("coach") {
            AccountType::Coach
        } else {
            AccountType::Customer
        };
        self.jwt.create_token(account_id, &email_of(account_id), account_type).unwrap()
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");

        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, body)
    }

    pub async fn get(&self, uri: &str, as_account: &str) -> (StatusCode, Value) {
        let token = self.token(as_account);
        self.request(Method::GET, uri, Some(&token), None).await
    }

    pub async fn post(&self, uri: &str, as_account: &str, body: Value) -> (StatusCode, Value) {
        let token = self.token(as_account);
        self.request(Method::POST, uri, Some(&token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, as_account: &str, body: Value) -> (StatusCode, Value) {
        let token = self.token(as_account);
        self.request(Method::PUT, uri, Some(&token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, as_account: &str) -> (StatusCode, Value) {
        let token = self.token(as_account);
        self.request(Method::DELETE, uri, Some(&token), None).await
    }

    /// Delivers every queued notification.
    pub async fn deliver(&mut self) -> usize {
        self.worker.drain().await
    }

    /// Row counts of every component table, for atomicity checks.
    pub async fn component_counts(&self) -> Vec<(Table, usize)> {
        let mut counts = Vec::new();
        for table in [
            Table::Protocols,
            Table::Diets,
            Table::Meals,
            Table::Foods,
            Table::Trains,
            Table::Exercises,
            Table::WorkoutSets,
            Table::Reps,
            Table::HormonalProtocols,
            Table::Hormones,
            Table::ExtraCompounds,
        ] {
            counts.push((table, self.store.row_count(table).await));
        }
        counts
    }

    pub fn store_handle(&self) -> Arc<dyn Store> {
        Arc::new(self.store.clone())
    }
}

pub fn email_of(account_id: &str) -> String {
    format!("{account_id}@example.com")
}

pub fn cutting_phase(client_id: &str) -> Value {
    serde_json::json!({
        "name": "Cutting Phase",
        "description": "Twelve week cut",
        "clientId": client_id,
        "diet": {
            "name": "Low Carb",
            "meals": [
                {
                    "name": "Breakfast",
                    "mealType": "BREAKFAST",
                    "foods": [
                        { "name": "Eggs", "quantity": 3, "unit": "UNIT", "proteins": 18, "fats": 15 },
                        { "name": "Oats", "quantity": 40, "unit": "GR", "carbs": 27 }
                    ]
                },
                {
                    "name": "Dinner",
                    "mealType": "DINNER",
                    "foods": [{ "name": "Salmon", "quantity": 200, "unit": "GR", "proteins": 40 }]
                }
            ]
        },
        "trains": [{
            "name": "Push Day",
            "weekDays": ["MONDAY", "THURSDAY"],
            "exercises": [{
                "name": "Bench Press",
                "type": "STRENGTH",
                "muscleGroup": "CHEST",
                "sets": [
                    { "reps": [{ "quantity": 8, "weight": 60 }, { "quantity": 8, "weight": 62.5 }] },
                    { "reps": [{ "quantity": 6, "weight": 70 }] }
                ]
            }]
        }],
        "hormonalProtocol": {
            "name": "TRT",
            "hormones": [{
                "name": "Testosterone Cypionate",
                "quantity": 100,
                "unit": "MG",
                "concentration": 200,
                "concentrationUnit": "MG_ML",
                "hormoneType": "TESTOSTERONE"
            }]
        },
        "extraCompounds": [{ "name": "Creatine", "quantity": 5, "unit": "MG" }]
    })
}
