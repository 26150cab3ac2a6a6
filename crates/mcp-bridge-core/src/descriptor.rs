//! Minimal protobuf descriptor types with gateway annotation support.
//!
//! The standard `prost-types` descriptor messages drop extension fields during
//! decoding because prost doesn't retain unknown fields. These custom types
//! preserve the gateway's option extensions — tool, prompt, and resource
//! annotations plus field descriptions — by declaring them at their published
//! extension numbers (see [`ext`]).
//!
//! Used by the descriptor-set loaders (reflection and compiled sources), the
//! annotation extractor, and the schema projector.

#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod types {
    use prost::Message;

    #[derive(Clone, PartialEq, Message)]
    pub struct FileDescriptorSet {
        #[prost(message, repeated, tag = "1")]
        pub file: Vec<FileDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct FileDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub package: Option<String>,
        /// Paths of imported `.proto` files, as declared by `import` statements.
        #[prost(string, repeated, tag = "3")]
        pub dependency: Vec<String>,
        #[prost(message, repeated, tag = "4")]
        pub message_type: Vec<DescriptorProto>,
        #[prost(message, repeated, tag = "5")]
        pub enum_type: Vec<EnumDescriptorProto>,
        #[prost(message, repeated, tag = "6")]
        pub service: Vec<ServiceDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct DescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(message, repeated, tag = "2")]
        pub field: Vec<FieldDescriptorProto>,
        #[prost(message, repeated, tag = "3")]
        pub nested_type: Vec<DescriptorProto>,
        #[prost(message, repeated, tag = "4")]
        pub enum_type: Vec<EnumDescriptorProto>,
        #[prost(message, optional, tag = "7")]
        pub options: Option<MessageOptions>,
    }

    /// Message-level options, including the gateway resource annotation.
    #[derive(Clone, PartialEq, Message)]
    pub struct MessageOptions {
        /// Set by the compiler on synthetic `map<K, V>` entry messages.
        #[prost(bool, optional, tag = "7")]
        pub map_entry: Option<bool>,
        /// Gateway `resource_name` extension.
        #[prost(string, optional, tag = "50021")]
        pub resource_name: Option<String>,
        /// Gateway `resource_description` extension.
        #[prost(string, optional, tag = "50022")]
        pub resource_description: Option<String>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct FieldDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(int32, optional, tag = "3")]
        pub number: Option<i32>,
        /// Field label: 1=optional, 2=required, 3=repeated.
        #[prost(int32, optional, tag = "4")]
        pub label: Option<i32>,
        /// Protobuf field type enum: 1=double, 5=int32, 9=string, 11=message, 14=enum, …
        #[prost(int32, optional, tag = "5")]
        pub r#type: Option<i32>,
        /// Fully-qualified type name for message/enum fields (e.g., `.examples.weather.v1.Unit`).
        #[prost(string, optional, tag = "6")]
        pub type_name: Option<String>,
        #[prost(message, optional, tag = "8")]
        pub options: Option<FieldOptions>,
    }

    /// Field-level options, including the gateway description annotation.
    #[derive(Clone, PartialEq, Message)]
    pub struct FieldOptions {
        /// Gateway `field_description` extension.
        #[prost(string, optional, tag = "50011")]
        pub field_description: Option<String>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct EnumDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(message, repeated, tag = "2")]
        pub value: Vec<EnumValueDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct EnumValueDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(int32, optional, tag = "2")]
        pub number: Option<i32>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct ServiceDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(message, repeated, tag = "2")]
        pub method: Vec<MethodDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct MethodDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub input_type: Option<String>,
        #[prost(string, optional, tag = "3")]
        pub output_type: Option<String>,
        #[prost(message, optional, tag = "4")]
        pub options: Option<MethodOptions>,
        #[prost(bool, optional, tag = "5")]
        pub client_streaming: Option<bool>,
        #[prost(bool, optional, tag = "6")]
        pub server_streaming: Option<bool>,
    }

    /// Method-level options carrying the gateway tool and prompt annotations.
    #[derive(Clone, PartialEq, Message)]
    pub struct MethodOptions {
        /// Gateway `tool_name` extension.
        #[prost(string, optional, tag = "50001")]
        pub tool_name: Option<String>,
        /// Gateway `tool_description` extension.
        #[prost(string, optional, tag = "50002")]
        pub tool_description: Option<String>,
        /// Gateway `read_only_hint` extension.
        #[prost(bool, optional, tag = "50003")]
        pub read_only_hint: Option<bool>,
        /// Gateway `destructive_hint` extension.
        #[prost(bool, optional, tag = "50004")]
        pub destructive_hint: Option<bool>,
        /// Gateway `idempotent_hint` extension.
        #[prost(bool, optional, tag = "50005")]
        pub idempotent_hint: Option<bool>,
        /// Gateway `open_world_hint` extension.
        #[prost(bool, optional, tag = "50006")]
        pub open_world_hint: Option<bool>,
        /// Gateway `prompt_name` extension.
        #[prost(string, optional, tag = "50007")]
        pub prompt_name: Option<String>,
        /// Gateway `prompt_description` extension.
        #[prost(string, optional, tag = "50008")]
        pub prompt_description: Option<String>,
    }
}

pub use types::*;

/// Published extension numbers for the gateway annotations.
///
/// Kept in one place so proto authors and the descriptor types above agree.
pub mod ext {
    /// Method option: tool name.
    pub const TOOL_NAME: u32 = 50001;
    /// Method option: tool description.
    pub const TOOL_DESCRIPTION: u32 = 50002;
    /// Method option: read-only behavior hint.
    pub const READ_ONLY_HINT: u32 = 50003;
    /// Method option: destructive behavior hint.
    pub const DESTRUCTIVE_HINT: u32 = 50004;
    /// Method option: idempotent behavior hint.
    pub const IDEMPOTENT_HINT: u32 = 50005;
    /// Method option: open-world behavior hint.
    pub const OPEN_WORLD_HINT: u32 = 50006;
    /// Method option: prompt name.
    pub const PROMPT_NAME: u32 = 50007;
    /// Method option: prompt description.
    pub const PROMPT_DESCRIPTION: u32 = 50008;
    /// Field option: field description.
    pub const FIELD_DESCRIPTION: u32 = 50011;
    /// Message option: resource name.
    pub const RESOURCE_NAME: u32 = 50021;
    /// Message option: resource description.
    pub const RESOURCE_DESCRIPTION: u32 = 50022;
}

/// Proto field type constants (from `google.protobuf.FieldDescriptorProto.Type`).
pub mod field_type {
    /// `TYPE_DOUBLE = 1`
    pub const DOUBLE: i32 = 1;
    /// `TYPE_FLOAT = 2`
    pub const FLOAT: i32 = 2;
    /// `TYPE_INT64 = 3`
    pub const INT64: i32 = 3;
    /// `TYPE_UINT64 = 4`
    pub const UINT64: i32 = 4;
    /// `TYPE_INT32 = 5`
    pub const INT32: i32 = 5;
    /// `TYPE_FIXED64 = 6`
    pub const FIXED64: i32 = 6;
    /// `TYPE_FIXED32 = 7`
    pub const FIXED32: i32 = 7;
    /// `TYPE_BOOL = 8`
    pub const BOOL: i32 = 8;
    /// `TYPE_STRING = 9`
    pub const STRING: i32 = 9;
    /// `TYPE_GROUP = 10`
    pub const GROUP: i32 = 10;
    /// `TYPE_MESSAGE = 11`
    pub const MESSAGE: i32 = 11;
    /// `TYPE_BYTES = 12`
    pub const BYTES: i32 = 12;
    /// `TYPE_UINT32 = 13`
    pub const UINT32: i32 = 13;
    /// `TYPE_ENUM = 14`
    pub const ENUM: i32 = 14;
    /// `TYPE_SFIXED32 = 15`
    pub const SFIXED32: i32 = 15;
    /// `TYPE_SFIXED64 = 16`
    pub const SFIXED64: i32 = 16;
    /// `TYPE_SINT32 = 17`
    pub const SINT32: i32 = 17;
    /// `TYPE_SINT64 = 18`
    pub const SINT64: i32 = 18;
}

/// Proto field label constants (from `google.protobuf.FieldDescriptorProto.Label`).
pub mod field_label {
    /// `LABEL_OPTIONAL = 1`
    pub const OPTIONAL: i32 = 1;
    /// `LABEL_REQUIRED = 2`
    pub const REQUIRED: i32 = 2;
    /// `LABEL_REPEATED = 3`
    pub const REPEATED: i32 = 3;
}

/// The canonical `TYPE_*` name for a proto field type constant.
///
/// Unknown values render as `TYPE_UNKNOWN`.
#[must_use]
pub fn field_type_name(ty: i32) -> &'static str {
    match ty {
        field_type::DOUBLE => "TYPE_DOUBLE",
        field_type::FLOAT => "TYPE_FLOAT",
        field_type::INT64 => "TYPE_INT64",
        field_type::UINT64 => "TYPE_UINT64",
        field_type::INT32 => "TYPE_INT32",
        field_type::FIXED64 => "TYPE_FIXED64",
        field_type::FIXED32 => "TYPE_FIXED32",
        field_type::BOOL => "TYPE_BOOL",
        field_type::STRING => "TYPE_STRING",
        field_type::GROUP => "TYPE_GROUP",
        field_type::MESSAGE => "TYPE_MESSAGE",
        field_type::BYTES => "TYPE_BYTES",
        field_type::UINT32 => "TYPE_UINT32",
        field_type::ENUM => "TYPE_ENUM",
        field_type::SFIXED32 => "TYPE_SFIXED32",
        field_type::SFIXED64 => "TYPE_SFIXED64",
        field_type::SINT32 => "TYPE_SINT32",
        field_type::SINT64 => "TYPE_SINT64",
        _ => "TYPE_UNKNOWN",
    }
}

impl FieldDescriptorProto {
    /// Whether this field carries the `repeated` label.
    #[must_use]
    pub fn is_repeated(&self) -> bool {
        self.label == Some(field_label::REPEATED)
    }

    /// The gateway field description annotation, if present.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.options.as_ref()?.field_description.as_deref()
    }
}

impl DescriptorProto {
    /// Whether this message is a synthetic `map<K, V>` entry.
    #[must_use]
    pub fn is_map_entry(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|o| o.map_entry)
            .unwrap_or(false)
    }
}
