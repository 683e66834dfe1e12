use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::{Entity, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeekDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseType {
    Cardio,
    Stretching,
    Strength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MuscleGroup {
    Chest,
    Back,
    Shoulders,
    Biceps,
    Triceps,
    Forearms,
    Calves,
    Abs,
    Quads,
    Hamstrings,
    Glutes,
    Adductors,
    Abductors,
    Traps,
    Lats,
    LowerBack,
    Obliques,
    Neck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetType {
    WarmUp,
    Working,
    Feeder,
    Top,
    BackOff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Train {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub week_days: Vec<WeekDay>,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub exercise_type: Option<ExerciseType>,
    pub muscle_group: Option<MuscleGroup>,
    pub equipment: Option<String>,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A set belongs to exactly one exercise and is ordered by `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSet {
    pub id: String,
    pub exercise_id: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rep {
    pub id: String,
    pub set_id: String,
    pub position: i32,
    pub quantity: f64,
    pub weight: f64,
    pub set_type: Option<SetType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Train {
    const TABLE: Table = Table::Trains;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Exercise {
    const TABLE: Table = Table::Exercises;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for WorkoutSet {
    const TABLE: Table = Table::WorkoutSets;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Rep {
    const TABLE: Table = Table::Reps;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDetails {
    #[serde(flatten)]
    pub set: WorkoutSet,
    pub reps: Vec<Rep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseDetails {
    #[serde(flatten)]
    pub exercise: Exercise,
    pub sets: Vec<SetDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainDetails {
    #[serde(flatten)]
    pub train: Train,
    pub exercises: Vec<ExerciseDetails>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepPayload {
    #[schemars(range(min = 0))]
    pub quantity: f64,
    #[schemars(range(min = 0))]
    pub weight: f64,
    pub set_type: Option<SetType>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetPayload {
    pub reps: Vec<RepPayload>,
}

/// An exercise with its sets, created on its own or nested in a train.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExercisePayload {
    #[schemars(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub exercise_type: Option<ExerciseType>,
    pub muscle_group: Option<MuscleGroup>,
    pub equipment: Option<String>,
    pub sets: Vec<SetPayload>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrainPayload {
    #[schemars(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    pub week_days: Vec<WeekDay>,
    pub exercises: Vec<ExercisePayload>,
}

/// Train created from existing exercises.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrain {
    #[schemars(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub week_days: Vec<WeekDay>,
    #[serde(default)]
    pub exercises: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrain {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(length(min = 1))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_days: Option<Vec<WeekDay>>,
    #[serde(skip_serializing)]
    pub exercises: Option<Vec<String>>,
}

/// Exercise update; `sets`, when present, replaces every existing set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExercise {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(length(min = 1))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub exercise_type: Option<ExerciseType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muscle_group: Option<MuscleGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment: Option<String>,
    #[serde(skip_serializing)]
    pub sets: Option<Vec<SetPayload>>,
}
