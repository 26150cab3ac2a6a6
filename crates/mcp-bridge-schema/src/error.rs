//! Typed error enum for schema projection.

/// Errors produced while projecting descriptors into schemas.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Message nesting exceeded the projection depth limit.
    ///
    /// Raised for self-referential messages and for legitimately deep
    /// nesting alike; the bound keeps projection terminating.
    #[error("message '{type_name}' exceeds the nesting limit at depth {depth}")]
    RecursionLimit {
        /// The message that triggered the bound.
        type_name: String,
        /// The depth that would have been reached.
        depth: usize,
    },

    /// A message or enum referenced by a field is absent from the set.
    #[error("type '{type_name}' is not present in the descriptor set")]
    MissingType {
        /// The fully-qualified type name.
        type_name: String,
    },

    /// A field carries a type value the projector does not recognize.
    #[error("field '{field}' has unsupported protobuf type {kind}")]
    UnknownKind {
        /// The field name.
        field: String,
        /// The raw protobuf type value.
        kind: i32,
    },
}

/// Convenience alias used throughout the library's public API.
pub type Result<T> = std::result::Result<T, Error>;
