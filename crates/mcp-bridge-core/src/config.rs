//! Declarative upstream service configuration.
//!
//! One [`UpstreamServiceConfig`] describes a remote service to project into
//! the gateway catalog. Exactly one protocol block should be present
//! (`grpc_service`, `webrtc_service`, or `vector_service`); the registrar
//! selects its bring-up path from that.
//!
//! # File format
//!
//! ```yaml
//! name: weather-service
//! auto_discover_tool: true
//!
//! grpc_service:
//!   address: "grpc://127.0.0.1:50051"
//!   use_reflection: true
//!   tools:
//!     - name: GetWeather
//!       call_id: get-weather
//!       read_only_hint: true
//!   calls:
//!     get-weather:
//!       service: examples.weather.v1.WeatherService
//!       method: GetWeather
//!   prompts:
//!     - name: briefing
//!       description: Summarize the forecast
//!   resources:
//!     - name: latest-report
//!       dynamic:
//!         grpc_call:
//!           id: get-weather
//!
//! upstream_auth:
//!   type: bearer_token
//!   token: "s3cret"
//!
//! tool_export_policy:
//!   default_action: unexport
//!   rules:
//!     - name_regex: ".*GetWeather"
//!       action: export
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::JsonSchema;

/// Top-level configuration for one upstream service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamServiceConfig {
    /// Raw service name; required, must survive sanitization.
    pub name: String,

    /// Durable content-hash ID. Set by the registrar, never read from config.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Sanitized name. Set by the registrar, never read from config.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sanitized_name: String,

    /// gRPC upstream block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grpc_service: Option<GrpcServiceConfig>,

    /// WebRTC data-channel upstream block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webrtc_service: Option<WebrtcServiceConfig>,

    /// Vector database upstream block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_service: Option<VectorServiceConfig>,

    /// Credentials presented to the upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_auth: Option<UpstreamAuthConfig>,

    /// Which discovered tools are exported to the catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_export_policy: Option<ExportPolicyConfig>,

    /// Which prompts are exported to the catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_export_policy: Option<ExportPolicyConfig>,

    /// Also emit tools for descriptor methods without annotations.
    pub auto_discover_tool: bool,

    /// Opaque resilience settings, passed through to tool records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resilience: Option<serde_json::Value>,
}

impl UpstreamServiceConfig {
    /// Parse a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Yaml`] on malformed input.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Load a configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be read and
    /// [`crate::Error::Yaml`] on malformed content.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}

/// gRPC upstream description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrpcServiceConfig {
    /// `host:port`, optionally prefixed with `grpc://`.
    pub address: String,

    /// Discover descriptors via server reflection instead of compiling
    /// proto sources.
    pub use_reflection: bool,

    /// Individual proto inputs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proto_definitions: Vec<ProtoDefinition>,

    /// Directory trees of proto sources.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proto_collection: Vec<ProtoCollection>,

    /// Tool surface overrides, keyed by tool name.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolConfig>,

    /// Declarative call bindings, keyed by call ID.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub calls: BTreeMap<String, CallConfig>,

    /// Prompt definitions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<PromptConfig>,

    /// Resource definitions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceConfig>,
}

/// One proto input: inline content, a file path, or a pre-compiled
/// descriptor set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtoDefinition {
    /// Source-form proto.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proto_file: Option<ProtoFile>,

    /// Serialized `FileDescriptorSet` bytes, passed through untouched.
    #[serde(skip_serializing_if = "Vec::is_empty", with = "serde_bytes_vec")]
    pub proto_descriptor: Vec<u8>,
}

/// Inline proto content or a filesystem path to a `.proto` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtoFile {
    /// Proto source text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,

    /// Path to a `.proto` file; validated before any read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// A directory tree of proto sources filtered by a path regex.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtoCollection {
    /// Root directory; validated before any read.
    pub root_path: String,

    /// Regex applied to paths relative to `root_path`. Empty matches all.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_match_regex: String,

    /// Descend into subdirectories; otherwise only direct children.
    pub is_recursive: bool,
}

/// Per-tool configuration: overrides, hints, and the disable switch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Tool name; matches annotation or auto-discovered names.
    pub name: String,

    /// Declarative call binding this tool routes through.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub call_id: String,

    /// Skip this tool entirely.
    pub disable: bool,

    /// Display title.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,

    /// Tool description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// The tool does not mutate upstream state.
    pub read_only_hint: bool,

    /// The tool may destroy upstream state.
    pub destructive_hint: bool,

    /// Repeating the call has no additional effect.
    pub idempotent_hint: bool,

    /// The tool interacts with entities outside the upstream.
    pub open_world_hint: bool,
}

/// A declarative call binding: which method a call ID routes to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Fully-qualified service name.
    pub service: String,

    /// Method local name.
    pub method: String,

    /// Declarative parameters; used to build the input schema when present.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterConfig>,

    /// Full input schema override; wins over `parameters`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<JsonSchema>,
}

/// One declarative call parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterConfig {
    /// Parameter name.
    pub name: String,

    /// Whether the parameter is required.
    pub required: bool,

    /// The parameter's schema; parameters without one are skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<ParameterSchema>,
}

/// Declared shape of one parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSchema {
    /// Declared type keyword.
    #[serde(rename = "type")]
    pub kind: ParameterKind,

    /// Description, copied verbatim into the projected schema.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Default value, copied verbatim into the projected schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// Declared parameter type. Unrecognized values parse as [`Self::Unknown`]
/// and project as `string`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// JSON string.
    #[default]
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
    /// Anything else.
    #[serde(other)]
    Unknown,
}

/// A prompt definition; template content passes through opaquely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Prompt name; empty names are skipped at registration.
    pub name: String,

    /// Prompt description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Skip this prompt entirely.
    pub disable: bool,

    /// Templated content, passed through to the prompt catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<serde_json::Value>,
}

/// A resource definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Resource name.
    pub name: String,

    /// Skip this resource entirely.
    pub disable: bool,

    /// Dynamic variant: resolved against a registered tool at registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicResourceConfig>,
}

/// Reference from a dynamic resource to a declared call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicResourceConfig {
    /// gRPC call reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grpc_call: Option<CallRef>,

    /// WebRTC call reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webrtc_call: Option<CallRef>,
}

/// A call ID reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallRef {
    /// The referenced call ID.
    pub id: String,
}

impl DynamicResourceConfig {
    /// The referenced call ID, regardless of protocol.
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        self.grpc_call
            .as_ref()
            .or(self.webrtc_call.as_ref())
            .map(|c| c.id.as_str())
    }
}

/// WebRTC data-channel upstream description. No descriptors exist for this
/// protocol; every tool comes from a declarative call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebrtcServiceConfig {
    /// Signaling endpoint address.
    pub address: String,

    /// Tool surface overrides.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolConfig>,

    /// Declarative call definitions, keyed by call ID.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub calls: BTreeMap<String, CallConfig>,

    /// Prompt definitions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<PromptConfig>,

    /// Resource definitions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceConfig>,
}

/// Vector database upstream description: exactly one backend block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorServiceConfig {
    /// Pinecone backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinecone: Option<PineconeConfig>,

    /// Milvus backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milvus: Option<MilvusConfig>,
}

/// Pinecone connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeConfig {
    /// API key sent as the `Api-Key` header.
    pub api_key: String,

    /// Explicit index host; wins over the constructed URL.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,

    /// Index name for the constructed base URL.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub index_name: String,

    /// Project ID for the constructed base URL.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project_id: String,

    /// Environment for the constructed base URL.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment: String,
}

/// Milvus connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MilvusConfig {
    /// Server address.
    pub address: String,

    /// Username for password auth.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,

    /// Password for password auth.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,

    /// API key auth; wins over username/password.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    /// Database name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub database_name: String,

    /// Collection to operate on.
    pub collection_name: String,
}

/// Upstream credential variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamAuthConfig {
    /// Static bearer token attached to every RPC.
    BearerToken {
        /// The token; must be non-empty.
        token: String,
    },
    /// Mutual TLS with client certificate and private CA.
    Mtls {
        /// Client certificate PEM path.
        client_cert_path: String,
        /// Client private key PEM path.
        client_key_path: String,
        /// CA certificate PEM path.
        ca_cert_path: String,
    },
}

/// Export policy: ordered rules plus a default action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportPolicyConfig {
    /// Action when no rule matches.
    pub default_action: ExportAction,

    /// Ordered rules; the first match decides.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ExportRule>,
}

/// One export policy rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRule {
    /// Regex matched against the candidate name.
    pub name_regex: String,

    /// Action when the regex matches.
    pub action: ExportAction,
}

/// Export or suppress a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportAction {
    /// Add the candidate to the catalog.
    #[default]
    Export,
    /// Keep the candidate out of the catalog.
    Unexport,
}

/// Plain `Vec<u8>` ser/de so descriptor bytes read as a YAML/JSON sequence.
mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(deserializer)
    }
}
