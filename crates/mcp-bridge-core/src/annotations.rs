//! Annotation extraction from descriptor sets.
//!
//! Walks every file in an indexed descriptor set and collects the gateway
//! annotations: tool entries per service method, prompt entries for methods
//! carrying a prompt name, and resource entries for messages carrying a
//! resource name. Field snapshots capture name, description, protobuf kind
//! string, and repeated flag for the input and output messages of each
//! method, so downstream consumers can describe a tool without re-walking
//! descriptors.

use crate::descriptor::{field_type_name, DescriptorProto, MethodDescriptorProto};
use crate::index::DescriptorIndex;

/// Behavior hints attached to a tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolHints {
    /// The tool does not mutate upstream state.
    pub read_only: bool,
    /// The tool may destroy upstream state.
    pub destructive: bool,
    /// Repeating the call with the same arguments has no additional effect.
    pub idempotent: bool,
    /// The tool interacts with entities outside the upstream service.
    pub open_world: bool,
}

/// Snapshot of one message field for tool descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedField {
    /// Field name as declared in the proto.
    pub name: String,
    /// Gateway field description annotation, empty when absent.
    pub description: String,
    /// Protobuf kind string, e.g. `TYPE_STRING`.
    pub kind: String,
    /// Whether the field is repeated.
    pub repeated: bool,
}

/// One tool entry extracted from a service method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolAnnotation {
    /// Tool name: the `tool_name` option, else the method's local name.
    pub name: String,
    /// Tool description, empty when absent.
    pub description: String,
    /// Fully-qualified service name.
    pub service_fqn: String,
    /// Method local name.
    pub method_name: String,
    /// Fully-qualified input message name (no leading dot).
    pub input_type: String,
    /// Fully-qualified output message name (no leading dot).
    pub output_type: String,
    /// Input message field snapshots.
    pub input_fields: Vec<AnnotatedField>,
    /// Output message field snapshots.
    pub output_fields: Vec<AnnotatedField>,
    /// Behavior hints.
    pub hints: ToolHints,
    /// Whether the method carried an explicit `tool_name` option.
    pub annotated: bool,
}

impl ToolAnnotation {
    /// The canonical `service/Method` invocation path.
    #[must_use]
    pub fn full_method(&self) -> String {
        format!("{}/{}", self.service_fqn, self.method_name)
    }
}

/// One prompt entry extracted from a method-level `prompt_name` option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAnnotation {
    /// Prompt name.
    pub name: String,
    /// Prompt description, empty when absent.
    pub description: String,
    /// Fully-qualified service name.
    pub service_fqn: String,
    /// Method local name.
    pub method_name: String,
}

/// One resource entry extracted from a message-level `resource_name` option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAnnotation {
    /// Resource name.
    pub name: String,
    /// Resource description, empty when absent.
    pub description: String,
    /// Fully-qualified message name.
    pub message_fqn: String,
}

/// Everything extracted from one descriptor set.
#[derive(Debug, Clone, Default)]
pub struct ExtractedAnnotations {
    /// Tool entries, one per service method, in declaration order.
    pub tools: Vec<ToolAnnotation>,
    /// Prompt entries, in declaration order.
    pub prompts: Vec<PromptAnnotation>,
    /// Resource entries, in declaration order.
    pub resources: Vec<ResourceAnnotation>,
}

/// Walk an indexed descriptor set and extract all gateway annotations.
#[must_use]
pub fn extract(index: &DescriptorIndex) -> ExtractedAnnotations {
    let mut out = ExtractedAnnotations::default();

    for file in &index.set().file {
        let package = file.package.as_deref().unwrap_or("");

        for msg in &file.message_type {
            collect_resources(&mut out.resources, package, msg);
        }

        for service in &file.service {
            let service_name = service.name.as_deref().unwrap_or("");
            let service_fqn = if package.is_empty() {
                service_name.to_string()
            } else {
                format!("{package}.{service_name}")
            };

            for method in &service.method {
                out.tools.push(tool_entry(index, &service_fqn, method));
                if let Some(prompt) = prompt_entry(&service_fqn, method) {
                    out.prompts.push(prompt);
                }
            }
        }
    }

    out
}

/// Snapshot the fields of a message for tool descriptions.
#[must_use]
pub fn snapshot_fields(message: &DescriptorProto) -> Vec<AnnotatedField> {
    message
        .field
        .iter()
        .map(|field| AnnotatedField {
            name: field.name.clone().unwrap_or_default(),
            description: field.description().unwrap_or_default().to_string(),
            kind: field_type_name(field.r#type.unwrap_or(0)).to_string(),
            repeated: field.is_repeated(),
        })
        .collect()
}

fn tool_entry(
    index: &DescriptorIndex,
    service_fqn: &str,
    method: &MethodDescriptorProto,
) -> ToolAnnotation {
    let method_name = method.name.as_deref().unwrap_or("");
    let opts = method.options.as_ref();

    let annotated = opts.is_some_and(|o| o.tool_name.is_some());
    let name = opts
        .and_then(|o| o.tool_name.clone())
        .unwrap_or_else(|| method_name.to_string());
    let description = opts
        .and_then(|o| o.tool_description.clone())
        .unwrap_or_default();

    let input_type = method
        .input_type
        .as_deref()
        .unwrap_or("")
        .trim_start_matches('.')
        .to_string();
    let output_type = method
        .output_type
        .as_deref()
        .unwrap_or("")
        .trim_start_matches('.')
        .to_string();

    let input_fields = index
        .message(&input_type)
        .map(snapshot_fields)
        .unwrap_or_default();
    let output_fields = index
        .message(&output_type)
        .map(snapshot_fields)
        .unwrap_or_default();

    let hints = opts.map_or(ToolHints::default(), |o| ToolHints {
        read_only: o.read_only_hint.unwrap_or(false),
        destructive: o.destructive_hint.unwrap_or(false),
        idempotent: o.idempotent_hint.unwrap_or(false),
        open_world: o.open_world_hint.unwrap_or(false),
    });

    ToolAnnotation {
        name,
        description,
        service_fqn: service_fqn.to_string(),
        method_name: method_name.to_string(),
        input_type,
        output_type,
        input_fields,
        output_fields,
        hints,
        annotated,
    }
}

fn prompt_entry(service_fqn: &str, method: &MethodDescriptorProto) -> Option<PromptAnnotation> {
    let opts = method.options.as_ref()?;
    let name = opts.prompt_name.clone()?;
    Some(PromptAnnotation {
        name,
        description: opts.prompt_description.clone().unwrap_or_default(),
        service_fqn: service_fqn.to_string(),
        method_name: method.name.clone().unwrap_or_default(),
    })
}

/// Recursively collect resource annotations from messages (handles nesting).
fn collect_resources(
    resources: &mut Vec<ResourceAnnotation>,
    parent_fqn: &str,
    msg: &DescriptorProto,
) {
    let msg_name = msg.name.as_deref().unwrap_or("");
    let fqn = if parent_fqn.is_empty() {
        msg_name.to_string()
    } else {
        format!("{parent_fqn}.{msg_name}")
    };

    if let Some(opts) = &msg.options {
        if let Some(resource_name) = &opts.resource_name {
            resources.push(ResourceAnnotation {
                name: resource_name.clone(),
                description: opts.resource_description.clone().unwrap_or_default(),
                message_fqn: fqn.clone(),
            });
        }
    }

    for nested in &msg.nested_type {
        collect_resources(resources, &fqn, nested);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::descriptor::{
        field_label, field_type, FieldDescriptorProto, FieldOptions, FileDescriptorProto,
        FileDescriptorSet, MessageOptions, MethodOptions, ServiceDescriptorProto,
    };

    use super::*;

    fn annotated_set() -> FileDescriptorSet {
        FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("weather.proto".to_string()),
                package: Some("examples.weather.v1".to_string()),
                dependency: vec![],
                message_type: vec![
                    DescriptorProto {
                        name: Some("GetWeatherRequest".to_string()),
                        field: vec![
                            FieldDescriptorProto {
                                name: Some("location".to_string()),
                                number: Some(1),
                                label: Some(field_label::OPTIONAL),
                                r#type: Some(field_type::STRING),
                                type_name: None,
                                options: Some(FieldOptions {
                                    field_description: Some("City or region".to_string()),
                                }),
                            },
                            FieldDescriptorProto {
                                name: Some("days".to_string()),
                                number: Some(2),
                                label: Some(field_label::REPEATED),
                                r#type: Some(field_type::INT32),
                                type_name: None,
                                options: None,
                            },
                        ],
                        nested_type: vec![],
                        enum_type: vec![],
                        options: None,
                    },
                    DescriptorProto {
                        name: Some("GetWeatherResponse".to_string()),
                        options: Some(MessageOptions {
                            map_entry: None,
                            resource_name: Some("weather-report".to_string()),
                            resource_description: Some("Latest report".to_string()),
                        }),
                        ..Default::default()
                    },
                ],
                enum_type: vec![],
                service: vec![ServiceDescriptorProto {
                    name: Some("WeatherService".to_string()),
                    method: vec![
                        crate::descriptor::MethodDescriptorProto {
                            name: Some("GetWeather".to_string()),
                            input_type: Some(".examples.weather.v1.GetWeatherRequest".to_string()),
                            output_type: Some(
                                ".examples.weather.v1.GetWeatherResponse".to_string(),
                            ),
                            options: Some(MethodOptions {
                                tool_name: Some("GetWeather".to_string()),
                                tool_description: Some("Fetch current weather".to_string()),
                                read_only_hint: Some(true),
                                idempotent_hint: Some(true),
                                ..Default::default()
                            }),
                            client_streaming: None,
                            server_streaming: None,
                        },
                        crate::descriptor::MethodDescriptorProto {
                            name: Some("PurgeHistory".to_string()),
                            input_type: Some(".examples.weather.v1.GetWeatherRequest".to_string()),
                            output_type: Some(
                                ".examples.weather.v1.GetWeatherResponse".to_string(),
                            ),
                            options: Some(MethodOptions {
                                prompt_name: Some("purge-briefing".to_string()),
                                ..Default::default()
                            }),
                            client_streaming: None,
                            server_streaming: None,
                        },
                    ],
                }],
            }],
        }
    }

    #[test]
    fn extracts_annotated_and_default_named_tools() {
        let index = DescriptorIndex::new(annotated_set());
        let extracted = extract(&index);

        assert_eq!(extracted.tools.len(), 2);

        let get_weather = &extracted.tools[0];
        assert_eq!(get_weather.name, "GetWeather");
        assert!(get_weather.annotated);
        assert_eq!(get_weather.description, "Fetch current weather");
        assert!(get_weather.hints.read_only);
        assert!(get_weather.hints.idempotent);
        assert!(!get_weather.hints.destructive);
        assert_eq!(
            get_weather.full_method(),
            "examples.weather.v1.WeatherService/GetWeather"
        );

        let purge = &extracted.tools[1];
        assert_eq!(purge.name, "PurgeHistory");
        assert!(!purge.annotated, "no tool_name option on PurgeHistory");
    }

    #[test]
    fn snapshots_input_fields_with_descriptions() {
        let index = DescriptorIndex::new(annotated_set());
        let extracted = extract(&index);
        let fields = &extracted.tools[0].input_fields;

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "location");
        assert_eq!(fields[0].description, "City or region");
        assert_eq!(fields[0].kind, "TYPE_STRING");
        assert!(!fields[0].repeated);
        assert_eq!(fields[1].kind, "TYPE_INT32");
        assert!(fields[1].repeated);
    }

    #[test]
    fn extracts_prompts_from_method_options() {
        let index = DescriptorIndex::new(annotated_set());
        let extracted = extract(&index);

        assert_eq!(extracted.prompts.len(), 1);
        assert_eq!(extracted.prompts[0].name, "purge-briefing");
        assert_eq!(extracted.prompts[0].method_name, "PurgeHistory");
    }

    #[test]
    fn extracts_resources_from_message_options() {
        let index = DescriptorIndex::new(annotated_set());
        let extracted = extract(&index);

        assert_eq!(extracted.resources.len(), 1);
        let resource = &extracted.resources[0];
        assert_eq!(resource.name, "weather-report");
        assert_eq!(
            resource.message_fqn,
            "examples.weather.v1.GetWeatherResponse"
        );
    }
}
