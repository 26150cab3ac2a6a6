//! Typed error enum for the `mcp-bridge-core` library API.
//!
//! Library consumers can match on specific variants. Orchestration layers
//! wrap these with service-level context at the registration boundary.

/// Errors produced by `mcp-bridge-core` operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A service or tool name is empty, or empty after sanitization.
    #[error("invalid name '{name}': empty or reduced to nothing by sanitization")]
    InvalidName {
        /// The rejected raw name.
        name: String,
    },

    /// A path contains a parent-directory (`..`) segment.
    #[error("invalid path '{path}': parent-directory segments are not allowed")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// A path resolves outside the working directory and every allowed directory.
    #[error("path '{path}' escapes the allowed directories")]
    PathEscape {
        /// The rejected path.
        path: String,
    },

    /// A fully-qualified method name is not in `Service/Method` or
    /// `package.Service.Method` form.
    #[error("invalid method name '{name}': expected 'package.Service/Method'")]
    InvalidMethodName {
        /// The malformed name.
        name: String,
    },

    /// A symbol was found in the descriptor set but is not a service.
    #[error("symbol '{symbol}' is not a service")]
    NotAService {
        /// The fully-qualified symbol name.
        symbol: String,
    },

    /// A method was not found on an existing service (or the service itself
    /// is absent from the descriptor set).
    #[error("method '{method}' not found on service '{service}'")]
    MethodNotFound {
        /// The service looked up.
        service: String,
        /// The missing method's local name.
        method: String,
    },

    /// A message or enum referenced by a descriptor is absent from the set.
    ///
    /// Indicates the set is not closed; loaders are expected to return
    /// closed sets.
    #[error("type '{type_name}' is not present in the descriptor set")]
    MissingType {
        /// The fully-qualified type name.
        type_name: String,
    },

    /// Protobuf descriptor decoding failure.
    #[error("failed to decode descriptor: {0}")]
    Decode(#[from] prost::DecodeError),

    /// YAML parsing failure while loading a service configuration.
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),

    /// File I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A catalog record could not be inserted.
    #[error("catalog rejected '{key}': {reason}")]
    Catalog {
        /// The catalog key of the rejected record.
        key: String,
        /// Why the catalog refused it.
        reason: String,
    },
}

/// Convenience alias used throughout the library's public API.
pub type Result<T> = std::result::Result<T, Error>;
