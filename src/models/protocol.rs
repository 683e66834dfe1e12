use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{
    Diet, DietDetails, DietPayload, ExtraCompound, ExtraCompoundPayload, HormonalProtocol,
    HormonalProtocolDetails, HormonalProtocolPayload, Train, TrainDetails, TrainPayload,
};
use crate::store::{Entity, Table};

/// A coach's plan for one client. `client_id` grants visibility only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub account_id: String,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Protocol {
    const TABLE: Table = Table::Protocols;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Protocol with its whole component graph materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDetails {
    #[serde(flatten)]
    pub protocol: Protocol,
    pub diets: Vec<DietDetails>,
    pub trains: Vec<TrainDetails>,
    pub hormonal_protocols: Vec<HormonalProtocolDetails>,
    pub extra_compounds: Vec<ExtraCompound>,
}

/// Protocol with first-level relations only, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolOverview {
    #[serde(flatten)]
    pub protocol: Protocol,
    pub diets: Vec<Diet>,
    pub trains: Vec<Train>,
    pub hormonal_protocols: Vec<HormonalProtocol>,
    pub extra_compounds: Vec<ExtraCompound>,
}

/// Body of `POST /protocol/createFullProtocol`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FullProtocolRequest {
    #[schemars(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[schemars(length(min = 1))]
    pub client_id: String,
    pub diet: Option<DietPayload>,
    pub trains: Option<Vec<TrainPayload>>,
    pub extra_compounds: Option<Vec<ExtraCompoundPayload>>,
    pub hormonal_protocol: Option<HormonalProtocolPayload>,
}

/// Protocol connected to components that already exist.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProtocol {
    #[schemars(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[schemars(length(min = 1))]
    pub client_id: String,
    pub diet: Option<String>,
    #[serde(default)]
    pub trains: Vec<String>,
    pub hormonal_protocol: Option<String>,
    #[serde(default)]
    pub extra_compounds: Vec<String>,
}

/// Relation fields present in the body replace the current links.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProtocol {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(length(min = 1))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(length(min = 1))]
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub diet: Option<String>,
    #[serde(skip_serializing)]
    pub trains: Option<Vec<String>>,
    #[serde(skip_serializing)]
    pub hormonal_protocol: Option<String>,
    #[serde(skip_serializing)]
    pub extra_compounds: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::validation::{parse, validate, ValidationFailure};
    use crate::models::{ExerciseType, MealType};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn cutting_phase() -> Value {
        json!({
            "name": "Cutting Phase",
            "clientId": "cust-1",
            "diet": {
                "name": "Low Carb",
                "meals": [{
                    "name": "Breakfast",
                    "mealType": "BREAKFAST",
                    "foods": [{ "name": "Eggs", "quantity": 3, "unit": "UNIT", "proteins": 18 }]
                }]
            },
            "trains": [{
                "name": "Push Day",
                "weekDays": ["MONDAY", "THURSDAY"],
                "exercises": [{
                    "name": "Bench Press",
                    "type": "STRENGTH",
                    "muscleGroup": "CHEST",
                    "sets": [{ "reps": [{ "quantity": 8, "weight": 60 }] }]
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

    #[test]
    fn test_full_protocol_request_parses() {
        let request: FullProtocolRequest = parse(cutting_phase()).unwrap();

        assert_eq!(request.client_id, "cust-1");
        let diet = request.diet.unwrap();
        assert_eq!(diet.meals[0].meal_type, MealType::Breakfast);
        let trains = request.trains.unwrap();
        assert_eq!(trains[0].exercises[0].exercise_type, Some(ExerciseType::Strength));
        assert_eq!(trains[0].exercises[0].sets[0].reps[0].quantity, 8.0);
        assert_eq!(request.extra_compounds.unwrap().len(), 1);
    }

    #[test]
    fn test_minimal_full_protocol_request() {
        let request: FullProtocolRequest = parse(json!({ "name": "Empty", "clientId": "c" })).unwrap();

        assert!(request.diet.is_none());
        assert!(request.trains.is_none());
        assert!(request.hormonal_protocol.is_none());
        assert!(request.extra_compounds.is_none());
    }

    #[test]
    fn test_invalid_meal_type_is_reported_with_path() {
        let mut body = cutting_phase();
        body["diet"]["meals"][0]["mealType"] = json!("BRUNCH");

        match validate::<FullProtocolRequest>(&body) {
            Err(ValidationFailure::Invalid(violations)) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].field, "diet.meals[0].mealType");
                assert_eq!(violations[0].received, Some(json!("BRUNCH")));
            }
            other => panic!("expected a violation, got {other:?}"),
        }
    }

    #[test]
    fn test_deep_violations_are_all_reported() {
        let mut body = cutting_phase();
        body["trains"][0]["exercises"][0]["sets"][0]["reps"][0]["weight"] = json!("heavy");
        body["hormonalProtocol"]["hormones"][0]["hormoneType"] = json!("GROWTH");
        body.as_object_mut().unwrap().remove("clientId");

        match validate::<FullProtocolRequest>(&body) {
            Err(ValidationFailure::Invalid(violations)) => {
                let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
                assert!(fields.contains(&"clientId"));
                assert!(fields.contains(&"trains[0].exercises[0].sets[0].reps[0].weight"));
                assert!(fields.contains(&"hormonalProtocol.hormones[0].hormoneType"));
            }
            other => panic!("expected violations, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_quantity_is_rejected() {
        let mut body = cutting_phase();
        body["diet"]["meals"][0]["foods"][0]["quantity"] = json!(-1);

        assert!(validate::<FullProtocolRequest>(&body).is_err());
    }

    #[test]
    fn test_update_protocol_serializes_only_columns() {
        let update: UpdateProtocol = parse(json!({
            "name": "Bulking",
            "trains": ["t1"],
            "diet": "d1"
        }))
        .unwrap();

        let row = serde_json::to_value(&update).unwrap();
        assert_eq!(row, json!({ "name": "Bulking" }));
        assert_eq!(update.trains, Some(vec!["t1".to_string()]));
    }
}
