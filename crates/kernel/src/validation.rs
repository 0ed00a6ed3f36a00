//! Payload validation against structural schemas.
//!
//! Pure function of (schema, value): walks the value alongside the schema and
//! collects every mismatch with the location where it occurred, so a caller
//! gets the full list in one response rather than one error per attempt.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use trellis_sdk::{ObjectSchema, Schema};

/// One mismatch between a payload and its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Path to the offending value: field names and array indices.
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// A payload that does not satisfy its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("payload failed validation with {} error(s)", .errors.len())]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Prepend a location segment (e.g. `body`, `query`) to every error.
    pub fn located(mut self, root: &str) -> Self {
        for error in &mut self.errors {
            error.loc.insert(0, root.to_string());
        }
        self
    }

    /// Human-readable one-line summary, for logs.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.loc.join("."), e.msg))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validate `value` against `schema`.
pub fn validate(schema: &Schema, value: &Value) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    let mut path = Vec::new();
    check(schema, value, &mut path, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

fn check(schema: &Schema, value: &Value, path: &mut Vec<String>, errors: &mut Vec<FieldError>) {
    match schema {
        Schema::Any => {}
        Schema::Nullable(inner) => {
            if !value.is_null() {
                check(inner, value, path, errors);
            }
        }
        Schema::String => expect(value.is_string(), schema, value, path, errors),
        Schema::NonBlankString => match value.as_str() {
            Some(text) if text.trim().is_empty() => errors.push(FieldError {
                loc: path.clone(),
                msg: "string must not be blank".to_string(),
                kind: "string_too_short",
            }),
            Some(_) => {}
            None => mismatch(schema, value, path, errors),
        },
        Schema::Boolean => expect(value.is_boolean(), schema, value, path, errors),
        Schema::Number => expect(value.is_number(), schema, value, path, errors),
        Schema::Integer => expect(is_integer(value), schema, value, path, errors),
        Schema::Array(items) => match value.as_array() {
            Some(array) => {
                for (index, item) in array.iter().enumerate() {
                    path.push(index.to_string());
                    check(items, item, path, errors);
                    path.pop();
                }
            }
            None => mismatch(schema, value, path, errors),
        },
        Schema::Object(object) => match value.as_object() {
            Some(map) => check_object(object, map, path, errors),
            None => mismatch(schema, value, path, errors),
        },
    }
}

fn check_object(
    object: &ObjectSchema,
    map: &serde_json::Map<String, Value>,
    path: &mut Vec<String>,
    errors: &mut Vec<FieldError>,
) {
    for field in &object.fields {
        path.push(field.name.clone());
        match map.get(&field.name) {
            Some(value) => check(&field.schema, value, path, errors),
            None if field.required => errors.push(FieldError {
                loc: path.clone(),
                msg: "field required".to_string(),
                kind: "missing",
            }),
            None => {}
        }
        path.pop();
    }

    if !object.allow_additional {
        for key in map.keys() {
            if object.get(key).is_none() {
                let mut loc = path.clone();
                loc.push(key.clone());
                errors.push(FieldError {
                    loc,
                    msg: "extra fields not permitted".to_string(),
                    kind: "extra_forbidden",
                });
            }
        }
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn expect(
    ok: bool,
    schema: &Schema,
    value: &Value,
    path: &[String],
    errors: &mut Vec<FieldError>,
) {
    if !ok {
        mismatch(schema, value, path, errors);
    }
}

fn mismatch(schema: &Schema, value: &Value, path: &[String], errors: &mut Vec<FieldError>) {
    errors.push(FieldError {
        loc: path.to_vec(),
        msg: format!(
            "expected {}, found {}",
            schema.type_name(),
            json_type_name(value)
        ),
        kind: "type_error",
    });
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
