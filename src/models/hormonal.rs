use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::{Entity, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoseUnit {
    Mg,
    Ml,
    Ui,
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConcentrationUnit {
    MgMl,
    Mg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HormoneType {
    NineteenNor,
    Dht,
    Testosterone,
    Peptide,
    Insulin,
    Thyroid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HormonalProtocol {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hormone {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit: DoseUnit,
    pub concentration: Option<f64>,
    pub concentration_unit: Option<ConcentrationUnit>,
    pub hormone_type: HormoneType,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A supplement or compound outside the hormonal protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraCompound {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit: DoseUnit,
    pub concentration: Option<f64>,
    pub concentration_unit: Option<ConcentrationUnit>,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for HormonalProtocol {
    const TABLE: Table = Table::HormonalProtocols;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Hormone {
    const TABLE: Table = Table::Hormones;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for ExtraCompound {
    const TABLE: Table = Table::ExtraCompounds;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HormonalProtocolDetails {
    #[serde(flatten)]
    pub hormonal_protocol: HormonalProtocol,
    pub hormones: Vec<Hormone>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HormonePayload {
    #[schemars(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[schemars(range(min = 0))]
    pub quantity: f64,
    pub unit: DoseUnit,
    #[schemars(range(min = 0))]
    pub concentration: Option<f64>,
    pub concentration_unit: Option<ConcentrationUnit>,
    pub hormone_type: HormoneType,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HormonalProtocolPayload {
    #[schemars(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    pub hormones: Vec<HormonePayload>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtraCompoundPayload {
    #[schemars(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[schemars(range(min = 0))]
    pub quantity: f64,
    pub unit: DoseUnit,
    #[schemars(range(min = 0))]
    pub concentration: Option<f64>,
    pub concentration_unit: Option<ConcentrationUnit>,
}

/// Hormonal protocol created from existing hormones.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateHormonalProtocol {
    #[schemars(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub hormones: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHormonalProtocol {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(length(min = 1))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub hormones: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHormone {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(length(min = 1))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<DoseUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub concentration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concentration_unit: Option<ConcentrationUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hormone_type: Option<HormoneType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExtraCompound {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(length(min = 1))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<DoseUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub concentration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concentration_unit: Option<ConcentrationUnit>,
}
