//! Typed error enum for upstream registration.
//!
//! Per-tool, per-prompt, and per-resource failures are logged and skipped
//! during registration; only identity, pool, and descriptor-acquisition
//! failures surface here, wrapped in [`Error::Registration`] so the
//! service name and the root cause chain both appear in the rendering.

/// Errors produced by `mcp-bridge-upstream` operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The reflection stream could not be opened or did not complete.
    #[error("failed to discover service by reflection at {address}: {message}")]
    ReflectionUnavailable {
        /// The endpoint that was dialed.
        address: String,
        /// Diagnostic detail.
        message: String,
    },

    /// Reflection listed no services after filtering built-ins.
    #[error("no services advertised by reflection at {address}")]
    NoServices {
        /// The endpoint that was queried.
        address: String,
    },

    /// A reflection response carried no file descriptor bytes.
    #[error("reflection returned no file descriptor for '{symbol}'")]
    MissingDescriptor {
        /// The symbol that was requested.
        symbol: String,
    },

    /// Malformed descriptor bytes.
    #[error("failed to decode descriptor: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A proto collection's path regex does not compile.
    #[error("invalid path regex '{pattern}': {source}")]
    InvalidRegex {
        /// The rejected pattern.
        pattern: String,
        /// The regex engine's diagnosis.
        source: regex::Error,
    },

    /// File I/O failure while materializing proto sources.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The proto compiler rejected the sources.
    #[error("failed to parse proto definitions: {0}")]
    Compile(String),

    /// The configured sources matched no proto files.
    #[error("no proto files matched the configured sources")]
    NoFiles,

    /// The service configuration is unusable.
    #[error("invalid service configuration: {0}")]
    InvalidConfig(String),

    /// Identity, path, or descriptor-model failure.
    #[error(transparent)]
    Core(#[from] mcp_bridge_core::Error),

    /// Pool construction or borrowing failure.
    #[error(transparent)]
    Pool(#[from] mcp_bridge_pool::Error),

    /// Vector backend construction failure.
    #[error(transparent)]
    Vector(#[from] mcp_bridge_vector::Error),

    /// Schema projection failure.
    #[error("schema projection failed: {0}")]
    Schema(#[from] mcp_bridge_schema::Error),

    /// The caller's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Registration failed; wraps the root cause with the service name.
    #[error("failed to register upstream service '{service}': {source}")]
    Registration {
        /// The raw configured service name.
        service: String,
        /// The failure that aborted registration.
        #[source]
        source: Box<Error>,
    },
}

/// Convenience alias used throughout the library's public API.
pub type Result<T> = std::result::Result<T, Error>;
