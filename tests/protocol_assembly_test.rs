mod common;

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{cutting_phase, MockNotifier, TestApp, CLIENT, COACH, OTHER_CLIENT, OTHER_COACH};
use iron_atlas::services::NotificationError;
use iron_atlas::store::{Fault, Relation, Table};

const CREATE_FULL: &str = "/protocol/createFullProtocol";

fn zero_counts() -> Vec<(Table, usize)> {
    [
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
    ]
    .into_iter()
    .map(|table| (table, 0))
    .collect()
}

fn owners(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_owners(value, &mut found);
    found
}

fn collect_owners(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(owner)) = map.get("accountId") {
                found.push(owner.clone());
            }
            map.values().for_each(|child| collect_owners(child, found));
        }
        Value::Array(items) => items.iter().for_each(|child| collect_owners(child, found)),
        _ => {}
    }
}

#[tokio::test]
async fn test_cutting_phase_is_created_with_every_component() {
    let app = TestApp::new().await;

    let (status, body) = app.post(CREATE_FULL, COACH, cutting_phase(CLIENT)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));

    let protocol = &body["data"];
    assert_eq!(protocol["name"], json!("Cutting Phase"));
    assert_eq!(protocol["accountId"], json!(COACH));
    assert_eq!(protocol["clientId"], json!(CLIENT));

    let diet = &protocol["diets"][0];
    assert_eq!(diet["name"], json!("Low Carb"));
    assert_eq!(diet["meals"].as_array().unwrap().len(), 2);
    assert_eq!(diet["meals"][0]["mealType"], json!("BREAKFAST"));
    assert_eq!(diet["meals"][0]["foods"][1]["name"], json!("Oats"));

    let exercise = &protocol["trains"][0]["exercises"][0];
    assert_eq!(protocol["trains"][0]["weekDays"], json!(["MONDAY", "THURSDAY"]));
    assert_eq!(exercise["type"], json!("STRENGTH"));
    assert_eq!(exercise["sets"][0]["position"], json!(0));
    assert_eq!(exercise["sets"][1]["position"], json!(1));
    assert_eq!(exercise["sets"][0]["reps"][1]["weight"], json!(62.5));
    assert_eq!(exercise["sets"][1]["reps"][0]["quantity"], json!(6.0));

    let hormone = &protocol["hormonalProtocols"][0]["hormones"][0];
    assert_eq!(hormone["hormoneType"], json!("TESTOSTERONE"));
    assert_eq!(protocol["extraCompounds"][0]["name"], json!("Creatine"));

    assert_eq!(app.store.row_count(Table::Protocols).await, 1);
    assert_eq!(app.store.row_count(Table::Foods).await, 3);
    assert_eq!(app.store.row_count(Table::WorkoutSets).await, 2);
    assert_eq!(app.store.row_count(Table::Reps).await, 3);
    assert_eq!(app.store.link_count(Relation::ProtocolDiets).await, 1);
    assert_eq!(app.store.link_count(Relation::MealFoods).await, 3);
}

#[tokio::test]
async fn test_every_created_row_belongs_to_the_caller() {
    let app = TestApp::new().await;

    let (status, body) = app.post(CREATE_FULL, COACH, cutting_phase(CLIENT)).await;
    assert_eq!(status, StatusCode::CREATED);

    let owners = owners(&body["data"]);
    // protocol, diet, 2 meals, 3 foods, train, exercise, hormonal protocol, hormone, extra compound
    assert_eq!(owners.len(), 12);
    assert!(owners.iter().all(|owner| owner == COACH));
}

#[tokio::test]
async fn test_owner_fields_in_the_body_are_ignored() {
    let app = TestApp::new().await;
    let mut body = cutting_phase(CLIENT);
    body["accountId"] = json!(OTHER_COACH);
    body["diet"]["accountId"] = json!(OTHER_COACH);

    let (status, response) = app.post(CREATE_FULL, COACH, body).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["data"]["accountId"], json!(COACH));
    assert_eq!(response["data"]["diets"][0]["accountId"], json!(COACH));
}

#[tokio::test]
async fn test_creation_response_matches_a_later_read() {
    let app = TestApp::new().await;

    let (_, created) = app.post(CREATE_FULL, COACH, cutting_phase(CLIENT)).await;
    let id = created["data"]["id"].as_str().unwrap();

    let (status, fetched) = app.get(&format!("/protocol/{id}"), COACH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"], created["data"]);

    let (status, as_client) = app.get(&format!("/protocol/{id}"), CLIENT).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_client["data"], created["data"]);
}

#[tokio::test]
async fn test_minimal_protocol_has_empty_relations() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(CREATE_FULL, COACH, json!({ "name": "Rest Week", "clientId": CLIENT }))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["diets"], json!([]));
    assert_eq!(body["data"]["trains"], json!([]));
    assert_eq!(body["data"]["hormonalProtocols"], json!([]));
    assert_eq!(body["data"]["extraCompounds"], json!([]));
}

#[tokio::test]
async fn test_failure_at_any_step_leaves_nothing_behind() {
    let faults = [
        Fault::insert_into(Table::Diets),
        Fault::insert_into(Table::Foods).after(2),
        Fault::insert_into(Table::Reps).after(2),
        Fault::insert_into(Table::Hormones),
        Fault::insert_into(Table::ExtraCompounds),
        Fault::insert_into(Table::Protocols),
        Fault::link(Relation::ProtocolTrains),
        Fault::link(Relation::ProtocolExtraCompounds),
        Fault::commit(),
    ];

    for fault in faults {
        let app = TestApp::new().await;
        app.store.inject(fault.clone()).await;

        let (status, body) = app.post(CREATE_FULL, COACH, cutting_phase(CLIENT)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "fault {fault:?}");
        assert_eq!(body["success"], json!(false));
        assert_eq!(app.component_counts().await, zero_counts(), "fault {fault:?}");
        for relation in Relation::ALL {
            assert_eq!(app.store.link_count(relation).await, 0, "fault {fault:?}");
        }
    }
}

#[tokio::test]
async fn test_failed_creation_sends_no_notification() {
    let mut app = TestApp::new().await;
    app.store.inject(Fault::link(Relation::ProtocolDiets)).await;

    let (status, _) = app.post(CREATE_FULL, COACH, cutting_phase(CLIENT)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.deliver().await, 0);
    assert_eq!(app.store.row_count(Table::Notifications).await, 0);
}

#[tokio::test]
async fn test_client_is_notified_after_commit() {
    let mut app = TestApp::new().await;

    let (status, _) = app.post(CREATE_FULL, COACH, cutting_phase(CLIENT)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.deliver().await, 1);

    let (status, body) = app.get("/notification", CLIENT).await;
    assert_eq!(status, StatusCode::OK);
    let notifications = body["data"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["title"], json!("New full protocol assigned to you"));
    assert_eq!(notifications[0]["read"], json!(false));
    assert!(notifications[0]["message"].as_str().unwrap().contains("Cutting Phase"));
}

#[tokio::test]
async fn test_notification_failure_does_not_affect_the_protocol() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify()
        .times(1)
        .returning(|_, _, recipient| Err(NotificationError::UnknownRecipient(recipient.to_string())));
    let mut app = TestApp::with_notifier(notifier).await;

    let (status, body) = app.post(CREATE_FULL, COACH, cutting_phase(CLIENT)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.deliver().await, 1);

    let id = body["data"]["id"].as_str().unwrap();
    let (status, _) = app.get(&format!("/protocol/{id}"), COACH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.row_count(Table::Protocols).await, 1);
}

#[tokio::test]
async fn test_unknown_client_is_rejected_without_writes() {
    let app = TestApp::new().await;

    let (status, body) = app.post(CREATE_FULL, COACH, cutting_phase("nobody")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Client not found"));
    assert_eq!(app.component_counts().await, zero_counts());
}

#[tokio::test]
async fn test_invalid_meal_type_is_reported_with_its_path() {
    let app = TestApp::new().await;
    let mut body = cutting_phase(CLIENT);
    body["diet"]["meals"][0]["mealType"] = json!("BRUNCH");

    let (status, response) = app.post(CREATE_FULL, COACH, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], json!(false));
    let errors = response["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["field"], json!("diet.meals[0].mealType"));
    assert_eq!(errors[0]["received"], json!("BRUNCH"));
    assert_eq!(app.component_counts().await, zero_counts());
}

#[tokio::test]
async fn test_every_violation_is_reported_at_once() {
    let app = TestApp::new().await;
    let mut body = cutting_phase(CLIENT);
    body["trains"][0]["exercises"][0]["sets"][0]["reps"][0]["weight"] = json!("heavy");
    body["extraCompounds"][0]["unit"] = json!("SPOON");
    body.as_object_mut().unwrap().remove("name");

    let (status, response) = app.post(CREATE_FULL, COACH, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = response["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|error| error["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields.len(), 3);
    assert!(fields.contains(&"trains[0].exercises[0].sets[0].reps[0].weight"));
    assert!(fields.contains(&"extraCompounds[0].unit"));
}

#[tokio::test]
async fn test_fractional_rep_quantity_is_stored() {
    let app = TestApp::new().await;
    let mut body = cutting_phase(CLIENT);
    body["trains"][0]["exercises"][0]["sets"][0]["reps"][0]["quantity"] = json!(8.5);
    body["trains"][0]["exercises"][0]["sets"][1]["reps"][0]["quantity"] = json!(3000000000u64);

    let (status, response) = app.post(CREATE_FULL, COACH, body).await;

    assert_eq!(status, StatusCode::CREATED);
    let sets = &response["data"]["trains"][0]["exercises"][0]["sets"];
    assert_eq!(sets[0]["reps"][0]["quantity"], json!(8.5));
    assert_eq!(sets[1]["reps"][0]["quantity"], json!(3000000000.0));
}

#[tokio::test]
async fn test_negative_rep_quantity_is_reported_with_its_path() {
    let app = TestApp::new().await;
    let mut body = cutting_phase(CLIENT);
    body["trains"][0]["exercises"][0]["sets"][0]["reps"][0]["quantity"] = json!(-2);

    let (status, response) = app.post(CREATE_FULL, COACH, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = response["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["field"], json!("trains[0].exercises[0].sets[0].reps[0].quantity"));
    assert_eq!(app.component_counts().await, zero_counts());
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = TestApp::new().await;
    let token = app.token(COACH);

    let (status, body) = app.request(Method::POST, CREATE_FULL, Some(&token), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Malformed request body"));
}

#[tokio::test]
async fn test_creation_requires_a_token() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::POST, CREATE_FULL, None, Some(cutting_phase(CLIENT)))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert_eq!(app.component_counts().await, zero_counts());
}

#[tokio::test]
async fn test_customers_cannot_create_protocols() {
    let app = TestApp::new().await;

    let (status, _) = app.post(CREATE_FULL, CLIENT, cutting_phase(OTHER_CLIENT)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.component_counts().await, zero_counts());
}
