//! The fixed tool surface registered for every vector upstream.
//!
//! Four tools — `query`, `upsert`, `delete`, `describe_index_stats` — wrap
//! a [`VectorClient`] and coerce loosely-typed caller arguments:
//!
//! - a vector is a list of numbers, each coerced to `f32`; any non-number
//!   element fails the call;
//! - `top_k` falls back to 10 when absent or of the wrong type;
//! - `filter` is accepted only when it is structurally a mapping and is
//!   silently dropped otherwise;
//! - `ids` entries that are not strings are stringified.

use std::collections::BTreeMap;
use std::sync::Arc;

use mcp_bridge_core::annotations::ToolHints;
use mcp_bridge_core::catalog::{ToolCallError, ToolHandler, ToolRecord};
use mcp_bridge_core::{JsonSchema, SchemaType};
use serde_json::{json, Value};

use crate::client::{DeleteRequest, VectorClient, VectorRecord};
use crate::error::Error;

/// Default number of matches returned by `query`.
pub const DEFAULT_TOP_K: u32 = 10;

/// Coerce a JSON value into a vector of `f32` components.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when the value is not an array or an
/// element is not a number.
pub fn coerce_vector(value: &Value) -> crate::Result<Vec<f32>> {
    let Some(items) = value.as_array() else {
        return Err(Error::InvalidArgument("vector must be a list of numbers".to_string()));
    };

    let mut out = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        match item.as_f64() {
            Some(number) => out.push(number as f32),
            None => {
                return Err(Error::InvalidArgument(format!(
                    "vector element {position} is not a number: {item}"
                )));
            }
        }
    }
    Ok(out)
}

/// Coerce `top_k`, defaulting when absent or of the wrong type.
#[must_use]
pub fn coerce_top_k(value: Option<&Value>) -> u32 {
    value
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(DEFAULT_TOP_K)
}

/// Accept a filter only when it is structurally a mapping.
#[must_use]
pub fn coerce_filter(value: Option<&Value>) -> Option<Value> {
    match value {
        Some(filter) if filter.is_object() => Some(filter.clone()),
        Some(other) => {
            tracing::warn!(value = %other, "dropping non-mapping filter argument");
            None
        }
        None => None,
    }
}

/// Coerce an `ids` array, stringifying non-string entries.
#[must_use]
pub fn coerce_ids(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn namespace_of(args: &Value) -> Option<String> {
    args.get("namespace")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

struct QueryTool {
    client: Arc<dyn VectorClient>,
}

#[async_trait::async_trait]
impl ToolHandler for QueryTool {
    async fn call(&self, args: Value) -> Result<Value, ToolCallError> {
        let vector = coerce_vector(args.get("vector").unwrap_or(&Value::Null))?;
        let top_k = coerce_top_k(args.get("top_k"));
        let filter = coerce_filter(args.get("filter"));

        let response = self
            .client
            .query(vector, top_k, filter, namespace_of(&args))
            .await?;
        serde_json::to_value(response).map_err(|e| ToolCallError::Upstream(e.to_string()))
    }
}

struct UpsertTool {
    client: Arc<dyn VectorClient>,
}

#[async_trait::async_trait]
impl ToolHandler for UpsertTool {
    async fn call(&self, args: Value) -> Result<Value, ToolCallError> {
        let Some(entries) = args.get("vectors").and_then(Value::as_array) else {
            return Err(ToolCallError::InvalidArgument(
                "vectors must be a list of records".to_string(),
            ));
        };

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = match entry.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    return Err(ToolCallError::InvalidArgument(
                        "vector record is missing an id".to_string(),
                    ));
                }
            };
            let values = coerce_vector(entry.get("values").unwrap_or(&Value::Null))?;
            records.push(VectorRecord {
                id,
                values,
                metadata: entry.get("metadata").cloned(),
            });
        }

        let response = self.client.upsert(records, namespace_of(&args)).await?;
        serde_json::to_value(response).map_err(|e| ToolCallError::Upstream(e.to_string()))
    }
}

struct DeleteTool {
    client: Arc<dyn VectorClient>,
}

#[async_trait::async_trait]
impl ToolHandler for DeleteTool {
    async fn call(&self, args: Value) -> Result<Value, ToolCallError> {
        let request = DeleteRequest {
            ids: coerce_ids(args.get("ids")),
            namespace: namespace_of(&args),
            filter: coerce_filter(args.get("filter")),
        };
        self.client.delete(request).await?;
        Ok(json!({"deleted": true}))
    }
}

struct StatsTool {
    client: Arc<dyn VectorClient>,
}

#[async_trait::async_trait]
impl ToolHandler for StatsTool {
    async fn call(&self, args: Value) -> Result<Value, ToolCallError> {
        let stats = self
            .client
            .describe_index_stats(coerce_filter(args.get("filter")))
            .await?;
        serde_json::to_value(stats).map_err(|e| ToolCallError::Upstream(e.to_string()))
    }
}

fn vector_schema() -> JsonSchema {
    JsonSchema::array(JsonSchema::of(SchemaType::Number))
        .with_description("Vector components")
}

fn record(
    service_id: &str,
    name: &str,
    description: &str,
    input_schema: JsonSchema,
    hints: ToolHints,
    handler: Arc<dyn ToolHandler>,
) -> ToolRecord {
    ToolRecord {
        key: format!("{service_id}.{name}"),
        name: name.to_string(),
        description: description.to_string(),
        service_id: service_id.to_string(),
        method_fqn: String::new(),
        request_type: None,
        response_type: None,
        input_schema,
        output_schema: JsonSchema::of(SchemaType::Object),
        hints,
        resilience: None,
        handler: Some(handler),
    }
}

/// Build the four fixed tool records for one vector upstream.
#[must_use]
pub fn vector_tools(service_id: &str, client: Arc<dyn VectorClient>) -> Vec<ToolRecord> {
    let namespace = JsonSchema::of(SchemaType::String).with_description("Namespace to operate in");
    let filter = JsonSchema::of(SchemaType::Object).with_description("Metadata filter");

    let query_input = JsonSchema {
        required: vec!["vector".to_string()],
        ..JsonSchema::object(BTreeMap::from([
            ("vector".to_string(), vector_schema()),
            (
                "top_k".to_string(),
                JsonSchema {
                    default: Some(json!(DEFAULT_TOP_K)),
                    ..JsonSchema::of(SchemaType::Integer)
                        .with_description("Number of matches to return")
                },
            ),
            ("filter".to_string(), filter.clone()),
            ("namespace".to_string(), namespace.clone()),
        ]))
    };

    let upsert_input = JsonSchema {
        required: vec!["vectors".to_string()],
        ..JsonSchema::object(BTreeMap::from([
            (
                "vectors".to_string(),
                JsonSchema::array(JsonSchema::object(BTreeMap::from([
                    ("id".to_string(), JsonSchema::of(SchemaType::String)),
                    ("values".to_string(), vector_schema()),
                    ("metadata".to_string(), JsonSchema::of(SchemaType::Object)),
                ]))),
            ),
            ("namespace".to_string(), namespace.clone()),
        ]))
    };

    let delete_input = JsonSchema::object(BTreeMap::from([
        (
            "ids".to_string(),
            JsonSchema::array(JsonSchema::of(SchemaType::String))
                .with_description("Record IDs to delete"),
        ),
        ("filter".to_string(), filter.clone()),
        ("namespace".to_string(), namespace),
    ]));

    let stats_input = JsonSchema::object(BTreeMap::from([("filter".to_string(), filter)]));

    vec![
        record(
            service_id,
            "query",
            "Similarity search over the index",
            query_input,
            ToolHints {
                read_only: true,
                idempotent: true,
                ..Default::default()
            },
            Arc::new(QueryTool {
                client: Arc::clone(&client),
            }),
        ),
        record(
            service_id,
            "upsert",
            "Insert or replace vectors",
            upsert_input,
            ToolHints {
                idempotent: true,
                ..Default::default()
            },
            Arc::new(UpsertTool {
                client: Arc::clone(&client),
            }),
        ),
        record(
            service_id,
            "delete",
            "Delete vectors by id or filter",
            delete_input,
            ToolHints {
                destructive: true,
                ..Default::default()
            },
            Arc::new(DeleteTool {
                client: Arc::clone(&client),
            }),
        ),
        record(
            service_id,
            "describe_index_stats",
            "Describe the index",
            stats_input,
            ToolHints {
                read_only: true,
                idempotent: true,
                ..Default::default()
            },
            Arc::new(StatsTool { client }),
        ),
    ]
}
