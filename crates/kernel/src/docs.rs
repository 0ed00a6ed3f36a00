//! Machine-readable documentation of plugin routes.
//!
//! Two views over the live dispatch table: a flat descriptor list grouped by
//! tag and prefix (for external doc-page renderers), and an OpenAPI 3.0
//! document.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};
use trellis_sdk::{HttpMethod, Schema};

use crate::auth::API_KEY_HEADER;
use crate::registry::{DispatchTable, EndpointDescriptor};

/// Documentation record for one route.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointDoc {
    pub method: HttpMethod,
    pub path: String,
    pub prefix: String,
    pub tag: String,
    pub plugin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// `RESOURCE:PERMISSION`, absent for public routes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl From<&EndpointDescriptor> for EndpointDoc {
    fn from(d: &EndpointDescriptor) -> Self {
        Self {
            method: d.method,
            path: d.full_path.clone(),
            prefix: d.prefix.clone(),
            tag: d.tag.clone(),
            plugin: d.owner.clone(),
            summary: d.summary.clone(),
            requires: d.requirement.map(|c| c.to_string()),
            input_schema: d.input_schema.as_deref().map(json_schema),
            output_schema: d.output_schema.as_deref().map(json_schema),
        }
    }
}

/// Route listing grouped for display.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointIndex {
    pub generation: u64,
    pub tags: BTreeMap<String, Vec<EndpointDoc>>,
    /// Prefix to `METHOD path` entries.
    pub prefixes: BTreeMap<String, Vec<String>>,
}

pub fn endpoint_index(table: &DispatchTable) -> EndpointIndex {
    let tags = table
        .by_tag()
        .iter()
        .map(|(tag, group)| {
            (
                tag.clone(),
                group.iter().map(|d| EndpointDoc::from(d.as_ref())).collect(),
            )
        })
        .collect();

    let prefixes = table
        .by_prefix()
        .iter()
        .map(|(prefix, group)| {
            (
                prefix.clone(),
                group
                    .iter()
                    .map(|d| format!("{} {}", d.method, d.full_path))
                    .collect(),
            )
        })
        .collect();

    EndpointIndex {
        generation: table.generation(),
        tags,
        prefixes,
    }
}

/// Render a schema as JSON Schema (OpenAPI 3.0 dialect).
pub fn json_schema(schema: &Schema) -> Value {
    match schema {
        Schema::Any => json!({}),
        Schema::String => json!({"type": "string"}),
        Schema::NonBlankString => json!({"type": "string", "minLength": 1, "pattern": "\\S"}),
        Schema::Integer => json!({"type": "integer"}),
        Schema::Number => json!({"type": "number"}),
        Schema::Boolean => json!({"type": "boolean"}),
        Schema::Array(items) => json!({"type": "array", "items": json_schema(items)}),
        Schema::Nullable(inner) => {
            let mut rendered = json_schema(inner);
            if let Value::Object(map) = &mut rendered {
                map.insert("nullable".to_string(), Value::Bool(true));
            }
            rendered
        }
        Schema::Object(object) => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for field in &object.fields {
                let mut rendered = json_schema(&field.schema);
                if let (Some(description), Value::Object(map)) = (&field.description, &mut rendered)
                {
                    map.insert("description".to_string(), json!(description));
                }
                properties.insert(field.name.clone(), rendered);
                if field.required {
                    required.push(json!(field.name));
                }
            }

            let mut rendered = json!({
                "type": "object",
                "properties": properties,
                "additionalProperties": object.allow_additional,
            });
            if !required.is_empty() {
                rendered["required"] = Value::Array(required);
            }
            rendered
        }
    }
}

/// Build an OpenAPI 3.0 document for every live plugin route.
pub fn openapi(table: &DispatchTable, version: &str) -> Value {
    let mut paths: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

    for descriptor in table.descriptors() {
        paths
            .entry(descriptor.full_path.clone())
            .or_default()
            .insert(
                descriptor.method.as_str().to_ascii_lowercase(),
                operation(&descriptor),
            );
    }

    let tags: Vec<Value> = table
        .by_tag()
        .keys()
        .map(|tag| json!({"name": tag}))
        .collect();

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Trellis plugin endpoints",
            "version": version,
        },
        "tags": tags,
        "paths": paths,
        "components": {
            "securitySchemes": {
                "ApiKeyHeader": {"type": "apiKey", "in": "header", "name": API_KEY_HEADER},
                "BearerAuth": {"type": "http", "scheme": "bearer", "bearerFormat": "JWT"},
            }
        }
    })
}

fn operation(d: &EndpointDescriptor) -> Value {
    let mut parameters: Vec<Value> = d
        .template()
        .param_names()
        .map(|name| {
            json!({
                "name": name,
                "in": "path",
                "required": true,
                "schema": {"type": "string"},
            })
        })
        .collect();

    let mut op = json!({
        "tags": [d.tag],
        "operationId": operation_id(d),
        "responses": {
            "200": {
                "description": "Successful Response",
                "content": {"application/json": {
                    "schema": d.output_schema.as_deref().map(json_schema).unwrap_or_else(|| json!({})),
                }},
            },
        },
    });

    if let Some(summary) = &d.summary {
        op["summary"] = json!(summary);
    }

    if let Some(schema) = d.input_schema.as_deref() {
        if d.method.has_body() {
            op["requestBody"] = json!({
                "required": true,
                "content": {"application/json": {"schema": json_schema(schema)}},
            });
        } else if let Schema::Object(object) = schema {
            parameters.extend(object.fields.iter().map(|field| {
                json!({
                    "name": field.name,
                    "in": "query",
                    "required": field.required,
                    "schema": json_schema(&field.schema),
                })
            }));
        }
        op["responses"]["422"] = json!({"description": "Validation Error"});
    }

    if !parameters.is_empty() {
        op["parameters"] = Value::Array(parameters);
    }

    if let Some(capability) = d.requirement {
        op["security"] = json!([{"ApiKeyHeader": []}, {"BearerAuth": []}]);
        op["x-required-capability"] = json!(capability.to_string());
        op["responses"]["401"] = json!({"description": "Not authenticated"});
        op["responses"]["403"] = json!({"description": "Missing capability"});
    }

    op
}

fn operation_id(d: &EndpointDescriptor) -> String {
    let slug: String = d
        .full_path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!(
        "{}_{}{}",
        d.owner,
        d.method.as_str().to_ascii_lowercase(),
        slug.trim_end_matches('_')
    )
}
