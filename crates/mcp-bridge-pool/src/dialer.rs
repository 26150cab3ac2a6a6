//! Pluggable connection opening.
//!
//! The gateway never dials upstream addresses directly: the process wires a
//! [`SafeDialer`] into every pool and the reflection loader, and that dialer
//! decides whether a destination is acceptable. The stock implementation in
//! the embedding process filters loopback and private-network destinations
//! unless explicitly allowed through the environment:
//!
//! - `MCPANY_DANGEROUS_ALLOW_LOCAL_IPS`
//! - `MCPANY_ALLOW_LOOPBACK_RESOURCES`
//! - `MCPANY_ALLOW_PRIVATE_NETWORK_RESOURCES`
//!
//! Those switches are interpreted by the dialer implementation, not here.
//! A refusal surfaces as an ordinary connection error on first use of the
//! channel; nothing in this crate distinguishes refused from unreachable.

use std::sync::Arc;

use futures::future::BoxFuture;
use http::Uri;
use tokio::net::TcpStream;

/// A pluggable connection opener: address in, TCP stream (or refusal) out.
pub type SafeDialer =
    Arc<dyn Fn(Uri) -> BoxFuture<'static, std::io::Result<TcpStream>> + Send + Sync>;

/// A dialer that connects directly with no destination filtering.
///
/// Test and development default; production embeds its own policy dialer.
#[must_use]
pub fn direct_dialer() -> SafeDialer {
    Arc::new(|uri: Uri| {
        Box::pin(async move {
            let host = uri.host().unwrap_or("127.0.0.1").to_string();
            let port = uri.port_u16().unwrap_or(80);
            TcpStream::connect((host.as_str(), port)).await
        })
    })
}

/// Strip a `grpc://` prefix from an endpoint address.
#[must_use]
pub fn normalize_address(address: &str) -> &str {
    address.strip_prefix("grpc://").unwrap_or(address)
}
