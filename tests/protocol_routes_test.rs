mod common;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{cutting_phase, TestApp, CLIENT, COACH, OTHER_CLIENT, OTHER_COACH};
use iron_atlas::store::{Relation, Table};

async fn create_full(app: &TestApp, client: &str) -> Value {
    let (status, body) = app.post("/protocol/createFullProtocol", COACH, cutting_phase(client)).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"].clone()
}

async fn create_train(app: &TestApp, owner: &str, name: &str) -> String {
    let (status, body) = app
        .post("/train", owner, json!({ "name": name, "weekDays": ["FRIDAY"] }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_protocol_connects_existing_components() {
    let app = TestApp::new().await;
    let legs = create_train(&app, COACH, "Leg Day").await;
    let (_, diet) = app.post("/diet", COACH, json!({ "name": "Maintenance" })).await;
    let diet_id = diet["data"]["id"].as_str().unwrap();

    let (status, body) = app
        .post(
            "/protocol",
            COACH,
            json!({ "name": "Base", "clientId": CLIENT, "diet": diet_id, "trains": [legs] }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["diets"][0]["name"], json!("Maintenance"));
    assert_eq!(body["data"]["trains"][0]["name"], json!("Leg Day"));
    assert_eq!(app.store.link_count(Relation::ProtocolTrains).await, 1);
}

#[tokio::test]
async fn test_protocol_cannot_connect_foreign_components() {
    let app = TestApp::new().await;
    let foreign = create_train(&app, OTHER_COACH, "Not Yours").await;

    let (status, body) = app
        .post("/protocol", COACH, json!({ "name": "Base", "clientId": CLIENT, "trains": [foreign] }))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Train not found"));
    assert_eq!(app.store.row_count(Table::Protocols).await, 0);
}

#[tokio::test]
async fn test_listing_is_scoped_to_owner_or_client() {
    let app = TestApp::new().await;
    create_full(&app, CLIENT).await;
    create_full(&app, OTHER_CLIENT).await;

    let (status, as_coach) = app.get("/protocol", COACH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_coach["data"].as_array().unwrap().len(), 2);
    assert_eq!(as_coach["data"][0]["diets"][0]["name"], json!("Low Carb"));
    assert!(as_coach["data"][0]["diets"][0].get("meals").is_none());

    let (_, as_client) = app.get("/protocol", CLIENT).await;
    assert_eq!(as_client["data"].as_array().unwrap().len(), 1);
    assert_eq!(as_client["data"][0]["clientId"], json!(CLIENT));

    let (_, as_other_coach) = app.get("/protocol", OTHER_COACH).await;
    assert_eq!(as_other_coach["data"], json!([]));
}

#[tokio::test]
async fn test_listing_is_paginated() {
    let app = TestApp::new().await;
    for _ in 0..3 {
        create_full(&app, CLIENT).await;
    }

    let (_, first) = app.get("/protocol?page=1&pageSize=2", COACH).await;
    let (_, second) = app.get("/protocol?page=2&pageSize=2", COACH).await;

    assert_eq!(first["data"].as_array().unwrap().len(), 2);
    assert_eq!(second["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bad_pagination_uses_the_error_envelope() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/protocol?page=abc", COACH).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["errors"][0]["field"], json!("page"));
    assert_eq!(body["errors"][0]["received"], json!("abc"));

    let (status, body) = app.get("/food?page=1&pageSize=2.5", COACH).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], json!("pageSize"));
}

#[tokio::test]
async fn test_protocol_is_hidden_from_other_accounts() {
    let app = TestApp::new().await;
    let protocol = create_full(&app, CLIENT).await;
    let uri = format!("/protocol/{}", protocol["id"].as_str().unwrap());

    let (status, body) = app.get(&uri, OTHER_COACH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Protocol not found"));

    let (status, _) = app.get(&uri, OTHER_CLIENT).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_latest_protocol_for_a_client() {
    let app = TestApp::new().await;
    create_full(&app, CLIENT).await;
    let (_, latest) = app
        .post("/protocol/createFullProtocol", COACH, json!({ "name": "Peak Week", "clientId": CLIENT }))
        .await;

    let (status, body) = app.get(&format!("/protocol/clients/{CLIENT}"), CLIENT).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], latest["data"]["id"]);

    let (status, _) = app.get(&format!("/protocol/clients/{CLIENT}"), OTHER_COACH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_count_and_dashboard_agree() {
    let app = TestApp::new().await;
    create_full(&app, CLIENT).await;
    create_full(&app, CLIENT).await;

    let (status, count) = app.get("/protocol/count/number", COACH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["data"]["count"], json!(2));

    let (_, dashboard) = app.get("/dashboard/protocolCount", COACH).await;
    assert_eq!(dashboard["data"]["count"], json!(2));

    let (_, clients) = app.get("/dashboard/clientsCount", COACH).await;
    assert_eq!(clients["data"]["count"], json!(1));
}

#[tokio::test]
async fn test_update_replaces_relations_as_a_set() {
    let mut app = TestApp::new().await;
    let protocol = create_full(&app, CLIENT).await;
    let id = protocol["id"].as_str().unwrap();
    let upper = create_train(&app, COACH, "Upper").await;
    let lower = create_train(&app, COACH, "Lower").await;
    app.deliver().await;

    let (status, body) = app
        .put(
            &format!("/protocol/{id}"),
            COACH,
            json!({ "name": "Cutting Phase II", "trains": [upper, lower, upper] }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("Cutting Phase II"));
    let names: Vec<&str> = body["data"]["trains"]
        .as_array()
        .unwrap()
        .iter()
        .map(|train| train["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Upper", "Lower"]);
    // Untouched relations stay linked.
    assert_eq!(body["data"]["diets"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["extraCompounds"].as_array().unwrap().len(), 1);
    // The replaced train still exists on its own.
    assert_eq!(app.store.row_count(Table::Trains).await, 3);

    assert_eq!(app.deliver().await, 1);
    let (_, notifications) = app.get("/notification", CLIENT).await;
    assert_eq!(notifications["data"][1]["title"], json!("Protocol updated"));
}

#[tokio::test]
async fn test_only_the_owner_updates_or_deletes() {
    let app = TestApp::new().await;
    let protocol = create_full(&app, CLIENT).await;
    let uri = format!("/protocol/{}", protocol["id"].as_str().unwrap());

    let (status, _) = app.put(&uri, OTHER_COACH, json!({ "name": "Hijack" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.put(&uri, CLIENT, json!({ "name": "Hijack" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, OTHER_COACH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_keeps_components() {
    let app = TestApp::new().await;
    let protocol = create_full(&app, CLIENT).await;
    let id = protocol["id"].as_str().unwrap();

    let (status, body) = app.delete(&format!("/protocol/{id}"), COACH).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(id));
    assert_eq!(app.store.row_count(Table::Protocols).await, 0);
    assert_eq!(app.store.row_count(Table::Diets).await, 1);
    assert_eq!(app.store.link_count(Relation::ProtocolDiets).await, 0);

    let (status, _) = app.get(&format!("/protocol/{id}"), COACH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trains_of_a_protocol() {
    let app = TestApp::new().await;
    let protocol = create_full(&app, CLIENT).await;
    let id = protocol["id"].as_str().unwrap();

    let (status, body) = app.get(&format!("/train/protocol/{id}"), CLIENT).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], protocol["trains"]);

    let (status, _) = app.get(&format!("/train/protocol/{id}"), OTHER_CLIENT).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
