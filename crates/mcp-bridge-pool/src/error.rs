//! Typed error enum for pool construction and use.

/// Errors produced by `mcp-bridge-pool` operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool options or service configuration are unusable.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// Credential configuration is unusable (empty token, bad header value).
    #[error("invalid auth configuration: {0}")]
    AuthConfig(String),

    /// A certificate/key path failed validation, or a config file read failed.
    #[error(transparent)]
    Path(#[from] mcp_bridge_core::Error),

    /// File I/O failure while loading TLS material.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Channel construction failure.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Eager pool initialization failed.
    #[error("pool initialization failed: {0}")]
    PoolInit(Box<Error>),

    /// The pool has been closed.
    #[error("pool is closed")]
    PoolClosed,

    /// The caller's context was cancelled while waiting.
    #[error("operation cancelled")]
    ContextCancelled,

    /// A health probe failed outright.
    #[error("health check failed: {0}")]
    HealthProbe(#[from] tonic::Status),

    /// A health probe reported a non-serving status.
    #[error("upstream reported non-serving health status: {status}")]
    Unhealthy {
        /// Diagnostic rendering of the reported status.
        status: String,
    },
}

/// Convenience alias used throughout the library's public API.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time assertion that `Error` is `Send + Sync`.
    const _: () = {
        const fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    };
}
