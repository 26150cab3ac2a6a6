//! Deterministic projection of protobuf structure into JSON schemas.
//!
//! Three input shapes feed the same output type:
//!
//! - **Descriptors** ([`Projector`]): message fields map to schema types per
//!   the fixed kind table; maps become `object` + `additionalProperties`,
//!   repeated fields become `array` + `items`, enums become `string` with
//!   the value names, nested messages recurse under a depth bound.
//! - **Declarative parameters** ([`project_parameters`]): one property per
//!   configured parameter, with descriptions and defaults copied verbatim.
//! - **Annotated field snapshots** ([`project_annotated_field`]): the
//!   `TYPE_*` kind strings captured during annotation extraction.

use std::collections::BTreeMap;

use mcp_bridge_core::annotations::AnnotatedField;
use mcp_bridge_core::config::{ParameterConfig, ParameterKind};
use mcp_bridge_core::descriptor::{field_type, DescriptorProto, FieldDescriptorProto};
use mcp_bridge_core::{DescriptorIndex, JsonSchema, SchemaType};

use crate::error::{Error, Result};

/// Maximum message nesting depth; descending past this fails projection.
pub const MAX_NESTING_DEPTH: usize = 10;

/// Projects message descriptors from one indexed set into JSON schemas.
#[derive(Debug, Clone, Copy)]
pub struct Projector<'a> {
    index: &'a DescriptorIndex,
}

impl<'a> Projector<'a> {
    /// A projector over an indexed descriptor set.
    #[must_use]
    pub const fn new(index: &'a DescriptorIndex) -> Self {
        Self { index }
    }

    /// Project a message (by fully-qualified name) into an object schema
    /// whose properties are exactly the message's fields.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingType`] if the message or a referenced type is not
    ///   in the set;
    /// - [`Error::RecursionLimit`] if nesting exceeds
    ///   [`MAX_NESTING_DEPTH`];
    /// - [`Error::UnknownKind`] on an unrecognized field type.
    pub fn message_schema(&self, fqn: &str) -> Result<JsonSchema> {
        let message = self.index.message(fqn).ok_or_else(|| Error::MissingType {
            type_name: fqn.to_string(),
        })?;
        self.message_properties(message, 0)
    }

    /// Project a single field as it appears inside its message.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::message_schema`].
    pub fn field_schema(&self, field: &FieldDescriptorProto, depth: usize) -> Result<JsonSchema> {
        let mut schema = if let Some(value_field) = self.map_value_field(field) {
            // Maps are detected before repeated handling so the synthetic
            // key/value entry fields never leak into the output.
            JsonSchema::map_of(self.singular_schema(&value_field, depth)?)
        } else if field.is_repeated() {
            JsonSchema::array(self.singular_schema(field, depth)?)
        } else {
            self.singular_schema(field, depth)?
        };

        if let Some(description) = field.description() {
            schema.description = Some(description.to_string());
        }
        Ok(schema)
    }

    fn message_properties(&self, message: &DescriptorProto, depth: usize) -> Result<JsonSchema> {
        let mut properties = BTreeMap::new();
        for field in &message.field {
            let name = field.name.clone().unwrap_or_default();
            properties.insert(name, self.field_schema(field, depth)?);
        }
        Ok(JsonSchema::object(properties))
    }

    /// Project a field ignoring its repeated label.
    fn singular_schema(&self, field: &FieldDescriptorProto, depth: usize) -> Result<JsonSchema> {
        let kind = field.r#type.unwrap_or(0);
        match kind {
            field_type::DOUBLE | field_type::FLOAT => Ok(JsonSchema::of(SchemaType::Number)),
            field_type::INT32
            | field_type::INT64
            | field_type::UINT32
            | field_type::UINT64
            | field_type::SINT32
            | field_type::SINT64
            | field_type::FIXED32
            | field_type::FIXED64
            | field_type::SFIXED32
            | field_type::SFIXED64 => Ok(JsonSchema::of(SchemaType::Integer)),
            field_type::BOOL => Ok(JsonSchema::of(SchemaType::Boolean)),
            field_type::STRING | field_type::BYTES => Ok(JsonSchema::of(SchemaType::String)),
            field_type::ENUM => self.enum_schema(field),
            field_type::MESSAGE | field_type::GROUP => self.nested_message_schema(field, depth),
            other => Err(Error::UnknownKind {
                field: field.name.clone().unwrap_or_default(),
                kind: other,
            }),
        }
    }

    fn enum_schema(&self, field: &FieldDescriptorProto) -> Result<JsonSchema> {
        let type_name = field.type_name.as_deref().unwrap_or("");
        let enum_desc = self
            .index
            .enum_type(type_name)
            .ok_or_else(|| Error::MissingType {
                type_name: type_name.trim_start_matches('.').to_string(),
            })?;

        let mut schema = JsonSchema::of(SchemaType::String);
        schema.enum_values = enum_desc
            .value
            .iter()
            .filter_map(|v| v.name.clone())
            .collect();
        Ok(schema)
    }

    fn nested_message_schema(
        &self,
        field: &FieldDescriptorProto,
        depth: usize,
    ) -> Result<JsonSchema> {
        let type_name = field.type_name.as_deref().unwrap_or("");
        let fqn = type_name.trim_start_matches('.');
        let message = self.index.message(fqn).ok_or_else(|| Error::MissingType {
            type_name: fqn.to_string(),
        })?;

        let next_depth = depth + 1;
        if next_depth > MAX_NESTING_DEPTH {
            return Err(Error::RecursionLimit {
                type_name: fqn.to_string(),
                depth: next_depth,
            });
        }
        self.message_properties(message, next_depth)
    }

    /// If the field is a protobuf map, return a copy of the synthetic
    /// entry's value field.
    fn map_value_field(&self, field: &FieldDescriptorProto) -> Option<FieldDescriptorProto> {
        if !field.is_repeated() || field.r#type != Some(field_type::MESSAGE) {
            return None;
        }
        let entry = self.index.message(field.type_name.as_deref()?)?;
        if !entry.is_map_entry() {
            return None;
        }
        entry.field.iter().find(|f| f.number == Some(2)).cloned()
    }
}

/// Project declarative call parameters into an object schema plus the
/// ordered names of parameters flagged required.
///
/// Parameters without a schema are skipped entirely, so the required list
/// only ever references emitted properties.
#[must_use]
pub fn project_parameters(parameters: &[ParameterConfig]) -> (JsonSchema, Vec<String>) {
    let mut properties = BTreeMap::new();
    let mut required = Vec::new();

    for parameter in parameters {
        let Some(declared) = &parameter.schema else {
            continue;
        };

        let mut schema = JsonSchema::of(parameter_type(declared.kind));
        if !declared.description.is_empty() {
            schema.description = Some(declared.description.clone());
        }
        if let Some(default) = &declared.default {
            schema.default = Some(default.clone());
        }

        if parameter.required {
            required.push(parameter.name.clone());
        }
        properties.insert(parameter.name.clone(), schema);
    }

    (JsonSchema::object(properties), required)
}

/// Project an annotated field snapshot into a schema.
///
/// The captured kind string (`TYPE_STRING`, `TYPE_INT32`, …) is stripped of
/// its prefix, lowercased, and mapped through the scalar table; repeated
/// fields wrap as arrays.
#[must_use]
pub fn project_annotated_field(field: &AnnotatedField) -> JsonSchema {
    let keyword = field
        .kind
        .strip_prefix("TYPE_")
        .unwrap_or(&field.kind)
        .to_lowercase();

    let scalar = JsonSchema::of(keyword_type(&keyword));
    let mut schema = if field.repeated {
        JsonSchema::array(scalar)
    } else {
        scalar
    };

    if !field.description.is_empty() {
        schema.description = Some(field.description.clone());
    }
    schema
}

fn parameter_type(kind: ParameterKind) -> SchemaType {
    match kind {
        ParameterKind::String | ParameterKind::Unknown => SchemaType::String,
        ParameterKind::Integer => SchemaType::Integer,
        ParameterKind::Number => SchemaType::Number,
        ParameterKind::Boolean => SchemaType::Boolean,
        ParameterKind::Array => SchemaType::Array,
        ParameterKind::Object => SchemaType::Object,
    }
}

fn keyword_type(keyword: &str) -> SchemaType {
    match keyword {
        "double" | "float" => SchemaType::Number,
        "int32" | "int64" | "uint32" | "uint64" | "sint32" | "sint64" | "fixed32" | "fixed64"
        | "sfixed32" | "sfixed64" => SchemaType::Integer,
        "bool" => SchemaType::Boolean,
        "message" | "group" => SchemaType::Object,
        // string, bytes, enum, and anything unrecognized
        _ => SchemaType::String,
    }
}

#[cfg(test)]
mod tests {
    use mcp_bridge_core::config::ParameterSchema;
    use mcp_bridge_core::descriptor::{
        field_label, EnumDescriptorProto, EnumValueDescriptorProto, FieldOptions,
        FileDescriptorProto, FileDescriptorSet, MessageOptions,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn field(
        name: &str,
        number: i32,
        label: i32,
        kind: i32,
        type_name: Option<&str>,
    ) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(label),
            r#type: Some(kind),
            type_name: type_name.map(ToString::to_string),
            options: None,
        }
    }

    fn index_of(messages: Vec<DescriptorProto>, enums: Vec<EnumDescriptorProto>) -> DescriptorIndex {
        DescriptorIndex::new(FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("test.proto".to_string()),
                package: Some("test.v1".to_string()),
                dependency: vec![],
                message_type: messages,
                enum_type: enums,
                service: vec![],
            }],
        })
    }

    #[test]
    fn scalar_kinds_follow_the_table() {
        let index = index_of(
            vec![DescriptorProto {
                name: Some("Scalars".to_string()),
                field: vec![
                    field("ratio", 1, field_label::OPTIONAL, field_type::DOUBLE, None),
                    field("count", 2, field_label::OPTIONAL, field_type::SINT64, None),
                    field("active", 3, field_label::OPTIONAL, field_type::BOOL, None),
                    field("payload", 4, field_label::OPTIONAL, field_type::BYTES, None),
                ],
                ..Default::default()
            }],
            vec![],
        );

        let schema = Projector::new(&index).message_schema("test.v1.Scalars").unwrap();
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["properties"]["ratio"], json!({"type": "number"}));
        assert_eq!(value["properties"]["count"], json!({"type": "integer"}));
        assert_eq!(value["properties"]["active"], json!({"type": "boolean"}));
        assert_eq!(value["properties"]["payload"], json!({"type": "string"}));
    }

    #[test]
    fn properties_are_exactly_the_field_names() {
        let index = index_of(
            vec![DescriptorProto {
                name: Some("GetWeatherRequest".to_string()),
                field: vec![field(
                    "location",
                    1,
                    field_label::OPTIONAL,
                    field_type::STRING,
                    None,
                )],
                ..Default::default()
            }],
            vec![],
        );

        let schema = Projector::new(&index)
            .message_schema("test.v1.GetWeatherRequest")
            .unwrap();
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({"type": "object", "properties": {"location": {"type": "string"}}})
        );
    }

    #[test]
    fn enums_emit_ordered_value_names() {
        let index = index_of(
            vec![DescriptorProto {
                name: Some("Reading".to_string()),
                field: vec![field(
                    "unit",
                    1,
                    field_label::OPTIONAL,
                    field_type::ENUM,
                    Some(".test.v1.Unit"),
                )],
                ..Default::default()
            }],
            vec![EnumDescriptorProto {
                name: Some("Unit".to_string()),
                value: vec![
                    EnumValueDescriptorProto {
                        name: Some("UNIT_UNSPECIFIED".to_string()),
                        number: Some(0),
                    },
                    EnumValueDescriptorProto {
                        name: Some("UNIT_CELSIUS".to_string()),
                        number: Some(1),
                    },
                ],
            }],
        );

        let schema = Projector::new(&index).message_schema("test.v1.Reading").unwrap();
        assert_eq!(
            serde_json::to_value(&schema).unwrap()["properties"]["unit"],
            json!({"type": "string", "enum": ["UNIT_UNSPECIFIED", "UNIT_CELSIUS"]})
        );
    }

    #[test]
    fn map_fields_emit_additional_properties_only() {
        let index = index_of(
            vec![DescriptorProto {
                name: Some("Tagged".to_string()),
                field: vec![field(
                    "labels",
                    1,
                    field_label::REPEATED,
                    field_type::MESSAGE,
                    Some(".test.v1.Tagged.LabelsEntry"),
                )],
                nested_type: vec![DescriptorProto {
                    name: Some("LabelsEntry".to_string()),
                    field: vec![
                        field("key", 1, field_label::OPTIONAL, field_type::STRING, None),
                        field("value", 2, field_label::OPTIONAL, field_type::INT32, None),
                    ],
                    options: Some(MessageOptions {
                        map_entry: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            vec![],
        );

        let schema = Projector::new(&index).message_schema("test.v1.Tagged").unwrap();
        let labels = &serde_json::to_value(&schema).unwrap()["properties"]["labels"];
        assert_eq!(
            *labels,
            json!({"type": "object", "additionalProperties": {"type": "integer"}})
        );
        assert!(labels.get("properties").is_none(), "synthetic entry leaked");
    }

    #[test]
    fn repeated_scalars_wrap_as_arrays() {
        let index = index_of(
            vec![DescriptorProto {
                name: Some("Series".to_string()),
                field: vec![field(
                    "samples",
                    1,
                    field_label::REPEATED,
                    field_type::FLOAT,
                    None,
                )],
                ..Default::default()
            }],
            vec![],
        );

        let schema = Projector::new(&index).message_schema("test.v1.Series").unwrap();
        assert_eq!(
            serde_json::to_value(&schema).unwrap()["properties"]["samples"],
            json!({"type": "array", "items": {"type": "number"}})
        );
    }

    #[test]
    fn field_descriptions_carry_through() {
        let index = index_of(
            vec![DescriptorProto {
                name: Some("Req".to_string()),
                field: vec![FieldDescriptorProto {
                    name: Some("location".to_string()),
                    number: Some(1),
                    label: Some(field_label::OPTIONAL),
                    r#type: Some(field_type::STRING),
                    type_name: None,
                    options: Some(FieldOptions {
                        field_description: Some("City or region".to_string()),
                    }),
                }],
                ..Default::default()
            }],
            vec![],
        );

        let schema = Projector::new(&index).message_schema("test.v1.Req").unwrap();
        assert_eq!(
            serde_json::to_value(&schema).unwrap()["properties"]["location"],
            json!({"type": "string", "description": "City or region"})
        );
    }

    /// A chain of `length` messages, each holding the next in a `child` field.
    fn chained_messages(length: usize) -> Vec<DescriptorProto> {
        (0..=length)
            .map(|i| {
                let mut msg = DescriptorProto {
                    name: Some(format!("M{i}")),
                    ..Default::default()
                };
                if i < length {
                    msg.field.push(field(
                        "child",
                        1,
                        field_label::OPTIONAL,
                        field_type::MESSAGE,
                        Some(&format!(".test.v1.M{}", i + 1)),
                    ));
                }
                msg
            })
            .collect()
    }

    #[test]
    fn nesting_at_the_limit_succeeds() {
        let index = index_of(chained_messages(MAX_NESTING_DEPTH), vec![]);
        Projector::new(&index).message_schema("test.v1.M0").unwrap();
    }

    #[test]
    fn nesting_past_the_limit_fails() {
        let index = index_of(chained_messages(MAX_NESTING_DEPTH + 1), vec![]);
        let err = Projector::new(&index)
            .message_schema("test.v1.M0")
            .unwrap_err();
        assert!(matches!(err, Error::RecursionLimit { .. }), "got: {err}");
    }

    #[test]
    fn self_referential_message_fails() {
        let index = index_of(
            vec![DescriptorProto {
                name: Some("Node".to_string()),
                field: vec![field(
                    "next",
                    1,
                    field_label::OPTIONAL,
                    field_type::MESSAGE,
                    Some(".test.v1.Node"),
                )],
                ..Default::default()
            }],
            vec![],
        );

        let err = Projector::new(&index)
            .message_schema("test.v1.Node")
            .unwrap_err();
        assert!(matches!(err, Error::RecursionLimit { .. }), "got: {err}");
    }

    #[test]
    fn parameters_project_with_defaults_and_required_order() {
        let parameters = vec![
            ParameterConfig {
                name: "location".to_string(),
                required: true,
                schema: Some(ParameterSchema {
                    kind: ParameterKind::String,
                    description: "City or region".to_string(),
                    default: None,
                }),
            },
            ParameterConfig {
                name: "unused".to_string(),
                required: true,
                schema: None,
            },
            ParameterConfig {
                name: "days".to_string(),
                required: true,
                schema: Some(ParameterSchema {
                    kind: ParameterKind::Integer,
                    description: String::new(),
                    default: Some(json!(3)),
                }),
            },
        ];

        let (schema, required) = project_parameters(&parameters);
        assert_eq!(required, vec!["location", "days"]);

        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            value["properties"]["location"],
            json!({"type": "string", "description": "City or region"})
        );
        assert_eq!(
            value["properties"]["days"],
            json!({"type": "integer", "default": 3})
        );
        assert!(value["properties"].get("unused").is_none());
    }

    #[test]
    fn unknown_parameter_kind_projects_as_string() {
        let parameters = vec![ParameterConfig {
            name: "ref".to_string(),
            required: false,
            schema: Some(ParameterSchema {
                kind: ParameterKind::Unknown,
                description: String::new(),
                default: None,
            }),
        }];

        let (schema, _) = project_parameters(&parameters);
        assert_eq!(
            serde_json::to_value(&schema).unwrap()["properties"]["ref"],
            json!({"type": "string"})
        );
    }

    #[test]
    fn annotated_fields_strip_prefix_and_wrap_repeated() {
        let scalar = AnnotatedField {
            name: "count".to_string(),
            description: String::new(),
            kind: "TYPE_UINT32".to_string(),
            repeated: false,
        };
        assert_eq!(
            serde_json::to_value(project_annotated_field(&scalar)).unwrap(),
            json!({"type": "integer"})
        );

        let repeated = AnnotatedField {
            name: "samples".to_string(),
            description: "Raw samples".to_string(),
            kind: "TYPE_DOUBLE".to_string(),
            repeated: true,
        };
        assert_eq!(
            serde_json::to_value(project_annotated_field(&repeated)).unwrap(),
            json!({"type": "array", "items": {"type": "number"}, "description": "Raw samples"})
        );
    }
}
