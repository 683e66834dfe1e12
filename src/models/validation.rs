//! Validation of untyped JSON request bodies against schemas derived from
//! the request types.
//!
//! Every violation is collected, each addressed by a field path such as
//! `diet.meals[0].mealType`, before any typed value is produced.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use jsonschema::{error::ValidationErrorKind, Draft, JSONSchema, ValidationError};
use once_cell::sync::Lazy;
use schemars::{gen::SchemaSettings, JsonSchema};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub constraint: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<Value>,
}

#[derive(Error, Debug)]
pub enum ValidationFailure {
    #[error("request body failed validation ({} violations)", .0.len())]
    Invalid(Vec<FieldViolation>),
    #[error("schema for {type_name} is unusable: {reason}")]
    Schema { type_name: &'static str, reason: String },
}

static VALIDATORS: Lazy<RwLock<HashMap<TypeId, Arc<JSONSchema>>>> = Lazy::new(Default::default);

const NUMERIC_FORMATS: [&str; 12] = [
    "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64", "float", "double",
];

/// Schemars annotates numbers with formats JSON Schema does not define.
fn strip_numeric_formats(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let numeric = map
                .get("format")
                .and_then(Value::as_str)
                .map(|format| NUMERIC_FORMATS.contains(&format))
                .unwrap_or(false);
            if numeric {
                if let Some((min, max)) = map.remove("format").as_ref().and_then(Value::as_str).and_then(integer_bounds) {
                    map.entry("minimum").or_insert_with(|| Value::from(min));
                    map.entry("maximum").or_insert_with(|| Value::from(max));
                }
            }
            map.values_mut().for_each(strip_numeric_formats);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_numeric_formats),
        _ => {}
    }
}

/// Range of the Rust integer behind a schemars format, kept as explicit
/// bounds so out-of-range numbers are reported against their field.
fn integer_bounds(format: &str) -> Option<(f64, f64)> {
    match format {
        "int8" => Some((i8::MIN as f64, i8::MAX as f64)),
        "int16" => Some((i16::MIN as f64, i16::MAX as f64)),
        "int32" => Some((i32::MIN as f64, i32::MAX as f64)),
        "int64" | "int" => Some((i64::MIN as f64, i64::MAX as f64)),
        "uint8" => Some((0.0, u8::MAX as f64)),
        "uint16" => Some((0.0, u16::MAX as f64)),
        "uint32" => Some((0.0, u32::MAX as f64)),
        "uint64" | "uint" => Some((0.0, u64::MAX as f64)),
        _ => None,
    }
}

/// Draft-07 schema for `T`, without nullable unions for optional fields.
pub fn schema_for<T: JsonSchema>() -> Result<Value, serde_json::Error> {
    let settings = SchemaSettings::draft07().with(|settings| {
        settings.option_nullable = false;
        settings.option_add_null_type = false;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();

    let mut schema = serde_json::to_value(root)?;
    strip_numeric_formats(&mut schema);
    Ok(schema)
}

fn compiled<T: JsonSchema + 'static>() -> Result<Arc<JSONSchema>, ValidationFailure> {
    let key = TypeId::of::<T>();
    if let Some(found) = VALIDATORS.read().ok().and_then(|cache| cache.get(&key).cloned()) {
        return Ok(found);
    }

    let unusable = |reason: String| ValidationFailure::Schema {
        type_name: type_name::<T>(),
        reason,
    };
    let schema = schema_for::<T>().map_err(|err| unusable(err.to_string()))?;
    let validator = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|err| unusable(err.to_string()))?;
    let validator = Arc::new(validator);

    if let Ok(mut cache) = VALIDATORS.write() {
        cache.insert(key, validator.clone());
    }
    Ok(validator)
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// `/diet/meals/0/mealType` -> `diet.meals[0].mealType`
pub fn field_path(pointer: &str) -> String {
    let mut path = String::new();
    for segment in pointer.split('/').skip(1).map(unescape) {
        push_segment(&mut path, &segment);
    }
    path
}

fn push_segment(path: &mut String, segment: &str) {
    if !path.is_empty() && !segment.is_empty() && segment.chars().all(|ch| ch.is_ascii_digit()) {
        path.push('[');
        path.push_str(segment);
        path.push(']');
    } else {
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(segment);
    }
}

fn violation(error: ValidationError<'_>) -> FieldViolation {
    let schema_path = error.schema_path.to_string();
    let constraint = schema_path
        .rsplit('/')
        .next()
        .filter(|keyword| !keyword.is_empty())
        .unwrap_or("schema")
        .to_string();
    let mut field = field_path(&error.instance_path.to_string());
    let message = error.to_string();

    let received = match &error.kind {
        ValidationErrorKind::Required { property } => {
            let property = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
            push_segment(&mut field, &property);
            None
        }
        _ => Some(error.instance.into_owned()),
    };

    FieldViolation {
        field: if field.is_empty() { "body".to_string() } else { field },
        constraint,
        message,
        received,
    }
}

/// Checks `instance` against the schema of `T`, reporting every violation.
pub fn validate<T: JsonSchema + 'static>(instance: &Value) -> Result<(), ValidationFailure> {
    let validator = compiled::<T>()?;
    let result = validator.validate(instance);

    match result {
        Ok(()) => Ok(()),
        Err(errors) => Err(ValidationFailure::Invalid(errors.map(violation).collect())),
    }
}

/// Validates and then deserializes `instance` into `T`.
pub fn parse<T>(instance: Value) -> Result<T, ValidationFailure>
where
    T: JsonSchema + DeserializeOwned + 'static,
{
    validate::<T>(&instance)?;

    serde_json::from_value(instance).map_err(|err| {
        ValidationFailure::Invalid(vec![FieldViolation {
            field: "body".to_string(),
            constraint: "type".to_string(),
            message: err.to_string(),
            received: None,
        }])
    })
}
