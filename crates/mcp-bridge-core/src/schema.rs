//! JSON-Schema-shaped value type for tool input and output descriptions.
//!
//! The gateway describes every tool argument surface with a small, fixed
//! subset of JSON Schema. [`JsonSchema`] serializes exactly the recognized
//! keys — `type`, `properties`, `items`, `additionalProperties`, `required`,
//! `enum`, `description`, `default` — and nothing else; consumers may
//! augment the serialized form but the projector never emits other keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The `type` keyword values the gateway emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// JSON string.
    String,
    /// JSON integer.
    Integer,
    /// JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

impl SchemaType {
    /// The lowercase keyword for this type.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// A JSON-Schema-shaped object restricted to the recognized keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonSchema {
    /// The `type` keyword.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,

    /// Named sub-schemas for object types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, JsonSchema>>,

    /// Element schema for array types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,

    /// Value schema for map-shaped objects.
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Box<JsonSchema>>,

    /// Names of required properties, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Allowed string values, in declaration order.
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Default value, copied verbatim from configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl JsonSchema {
    /// A schema with only the `type` keyword set.
    #[must_use]
    pub fn of(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    /// An object schema with the given properties.
    #[must_use]
    pub fn object(properties: BTreeMap<String, JsonSchema>) -> Self {
        Self {
            schema_type: Some(SchemaType::Object),
            properties: Some(properties),
            ..Self::default()
        }
    }

    /// An array schema with the given element schema.
    #[must_use]
    pub fn array(items: JsonSchema) -> Self {
        Self {
            schema_type: Some(SchemaType::Array),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// A map-shaped object schema: `additionalProperties` without `properties`.
    #[must_use]
    pub fn map_of(values: JsonSchema) -> Self {
        Self {
            schema_type: Some(SchemaType::Object),
            additional_properties: Some(Box::new(values)),
            ..Self::default()
        }
    }

    /// Attach a description, leaving everything else untouched.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_only_recognized_keys() {
        let schema = JsonSchema::object(BTreeMap::from([(
            "location".to_string(),
            JsonSchema::of(SchemaType::String),
        )]));

        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            value,
            json!({"type": "object", "properties": {"location": {"type": "string"}}})
        );
    }

    #[test]
    fn map_shape_has_no_properties_key() {
        let schema = JsonSchema::map_of(JsonSchema::of(SchemaType::Integer));
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            value,
            json!({"type": "object", "additionalProperties": {"type": "integer"}})
        );
    }

    #[test]
    fn enum_and_required_keep_order() {
        let schema = JsonSchema {
            schema_type: Some(SchemaType::String),
            enum_values: vec!["CELSIUS".to_string(), "FAHRENHEIT".to_string()],
            ..Default::default()
        };
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            value,
            json!({"type": "string", "enum": ["CELSIUS", "FAHRENHEIT"]})
        );
    }

    #[test]
    fn round_trips_through_json() {
        let schema = JsonSchema {
            schema_type: Some(SchemaType::Object),
            properties: Some(BTreeMap::from([(
                "top_k".to_string(),
                JsonSchema {
                    schema_type: Some(SchemaType::Integer),
                    default: Some(json!(10)),
                    description: Some("Result count".to_string()),
                    ..Default::default()
                },
            )])),
            required: vec!["top_k".to_string()],
            ..Default::default()
        };

        let text = serde_json::to_string(&schema).unwrap();
        let back: JsonSchema = serde_json::from_str(&text).unwrap();
        assert_eq!(schema, back);
    }

    #[test]
    fn type_keywords_are_lowercase() {
        assert_eq!(SchemaType::Integer.keyword(), "integer");
        assert_eq!(
            serde_json::to_value(SchemaType::Boolean).unwrap(),
            json!("boolean")
        );
    }
}
