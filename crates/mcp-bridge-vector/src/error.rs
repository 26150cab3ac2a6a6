//! Typed error enum for the vector-database adapters.

/// Errors produced by `mcp-bridge-vector` operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Backend configuration is missing required fields.
    #[error("invalid vector backend configuration: {0}")]
    InvalidConfig(String),

    /// A caller-supplied argument could not be coerced.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend answered with an HTTP error status.
    #[error("upstream error: status {status}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The HTTP request itself failed (connect, timeout, body decode).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenience alias used throughout the library's public API.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for mcp_bridge_core::catalog::ToolCallError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument(msg) => Self::InvalidArgument(msg),
            other => Self::Upstream(other.to_string()),
        }
    }
}
