mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{cutting_phase, TestApp, CLIENT, COACH, OTHER_CLIENT, OTHER_COACH, PLAN, SUBSCRIPTION};
use iron_atlas::store::{self, Store, Table};

#[tokio::test]
async fn test_plan_catalog() {
    let app = TestApp::new().await;

    let (status, created) = app
        .post("/plan", OTHER_COACH, json!({ "name": "Yearly", "price": 399.0, "duration": 12 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().unwrap();

    let (_, plans) = app.get("/plan", CLIENT).await;
    assert_eq!(plans["data"].as_array().unwrap().len(), 2);

    let (status, plan) = app.get(&format!("/plan/{id}"), COACH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["data"]["duration"], json!(12));

    let (status, _) = app.delete(&format!("/plan/{id}"), COACH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&format!("/plan/{id}"), OTHER_COACH).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_plan_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;

    let (status, body) = app.delete(&format!("/plan/{PLAN}"), COACH).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], json!("Plan still has subscriptions"));
    assert_eq!(app.store.row_count(Table::Plans).await, 1);
}

#[tokio::test]
async fn test_invalid_plan_is_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post("/plan", COACH, json!({ "name": "", "price": -1, "duration": 0 }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_activation_keys_are_issued_unassigned() {
    let app = TestApp::new().await;

    let (status, body) = app.post("/subscription", COACH, json!({ "planId": PLAN })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["accountId"], json!(null));
    assert_eq!(body["data"]["active"], json!(false));

    let key = body["data"]["id"].as_str().unwrap();
    let (status, status_body) = app.get(&format!("/subscription/{key}"), OTHER_COACH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_body["data"]["plan"]["id"], json!(PLAN));

    let (status, _) = app.post("/subscription", COACH, json!({ "planId": "missing" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assigned_subscription_is_private() {
    let app = TestApp::new().await;

    let (status, _) = app.get(&format!("/subscription/{SUBSCRIPTION}"), COACH).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/subscription/{SUBSCRIPTION}"), OTHER_COACH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_verify_checks_the_granting_subscription() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/subscription/verify", COACH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscription"]["id"], json!(SUBSCRIPTION));
    assert!(body["data"]["expiresAt"].is_string());

    let (status, body) = app.get("/subscription/verify", CLIENT).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscription"]["id"], json!(SUBSCRIPTION));

    let (status, _) = app.get("/subscription/verify", OTHER_COACH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/subscription/verify", OTHER_CLIENT).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_subscription_is_forbidden() {
    let app = TestApp::new().await;
    let activated = Utc::now() - Duration::days(62);
    let changes = store::to_row(&json!({ "activatedAt": activated })).unwrap();

    let mut tx = app.store.begin().await.unwrap();
    tx.update(Table::Subscriptions, SUBSCRIPTION, changes).await.unwrap();
    tx.commit().await.unwrap();

    let (status, body) = app.get("/subscription/verify", CLIENT).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], json!("Subscription expired"));
}

#[tokio::test]
async fn test_change_moves_the_coach_to_a_new_plan() {
    let app = TestApp::new().await;
    let (_, yearly) = app
        .post("/plan", COACH, json!({ "name": "Yearly", "price": 399.0, "duration": 12 }))
        .await;
    let yearly_id = yearly["data"]["id"].as_str().unwrap();

    let (status, changed) = app
        .post("/subscription/change", COACH, json!({ "planId": yearly_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["data"]["plan"]["id"], json!(yearly_id));
    assert_eq!(changed["data"]["subscription"]["active"], json!(true));

    let (_, verified) = app.get("/subscription/verify", COACH).await;
    assert_eq!(verified["data"]["plan"]["id"], json!(yearly_id));

    let (_, subscriptions) = app.get("/subscription", COACH).await;
    let subscriptions = subscriptions["data"].as_array().unwrap();
    assert_eq!(subscriptions.len(), 2);
    assert_eq!(subscriptions.iter().filter(|subscription| subscription["active"] == json!(true)).count(), 1);
}

#[tokio::test]
async fn test_subscription_delete_is_owner_only() {
    let app = TestApp::new().await;

    let (status, _) = app.delete(&format!("/subscription/{SUBSCRIPTION}"), OTHER_COACH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.delete(&format!("/subscription/{SUBSCRIPTION}"), COACH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(SUBSCRIPTION));
}

#[tokio::test]
async fn test_notification_inbox() {
    let mut app = TestApp::new().await;
    app.post("/protocol/createFullProtocol", COACH, cutting_phase(CLIENT)).await;
    app.deliver().await;

    let (_, inbox) = app.get("/notification", CLIENT).await;
    let id = inbox["data"][0]["id"].as_str().unwrap().to_string();
    let uri = format!("/notification/{id}");

    let (status, _) = app.put(&uri, COACH, json!({ "read": true })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.put(&uri, CLIENT, json!({ "read": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["read"], json!(true));

    let (status, _) = app.put(&uri, CLIENT, json!({ "read": "yes" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&uri, CLIENT).await;
    assert_eq!(status, StatusCode::OK);

    let (_, inbox) = app.get("/notification", CLIENT).await;
    assert_eq!(inbox["data"], json!([]));
}
