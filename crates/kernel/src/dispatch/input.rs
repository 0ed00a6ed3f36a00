//! Request payload extraction and input validation.

use std::collections::HashMap;

use serde_json::{Map, Value};
use trellis_sdk::{HttpMethod, Schema};

use super::error::DispatchError;
use crate::validation::validate;

/// Parse and validate the payload for one request.
///
/// A JSON body is the payload when one is sent. Body-less GET and DELETE
/// requests against a route with an input schema use the query string
/// instead, with values coerced to the scalar types the schema names.
pub fn extract_input(
    method: HttpMethod,
    schema: Option<&Schema>,
    body: &[u8],
    query: &HashMap<String, String>,
) -> Result<Option<Value>, DispatchError> {
    let from_body = !body.iter().all(u8::is_ascii_whitespace);

    let (input, location) = if from_body {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| DispatchError::MalformedBody(e.to_string()))?;
        (Some(value), "body")
    } else if !method.has_body() && schema.is_some() {
        (schema.map(|s| query_value(s, query)), "query")
    } else {
        (None, "body")
    };

    if let Some(schema) = schema {
        let null = Value::Null;
        validate(schema, input.as_ref().unwrap_or(&null)).map_err(|e| e.located(location))?;
    }

    Ok(input)
}

/// Turn query parameters into a JSON object shaped for `schema`.
fn query_value(schema: &Schema, query: &HashMap<String, String>) -> Value {
    let object = match schema {
        Schema::Object(object) => Some(object),
        _ => None,
    };

    let map: Map<String, Value> = query
        .iter()
        .map(|(key, raw)| {
            let field = object.and_then(|o| o.get(key)).map(|f| &f.schema);
            (key.clone(), coerce(field, raw))
        })
        .collect();
    Value::Object(map)
}

fn coerce(schema: Option<&Schema>, raw: &str) -> Value {
    let parsed = match schema {
        Some(Schema::Nullable(inner)) => return coerce(Some(inner.as_ref()), raw),
        Some(Schema::Integer) => raw.parse::<i64>().ok().map(Value::from),
        Some(Schema::Number) => raw.parse::<f64>().ok().map(Value::from),
        Some(Schema::Boolean) => raw.parse::<bool>().ok().map(Value::from),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_string()))
}
