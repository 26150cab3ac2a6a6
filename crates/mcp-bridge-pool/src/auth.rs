//! Per-RPC upstream credentials.
//!
//! Bearer tokens attach to every outgoing request through a tonic
//! [`Interceptor`]; mutual TLS is handled at channel construction (see
//! [`crate::tls`]). Credentials are derived from the service configuration
//! once per pool and cloned into every handed-out client.

use mcp_bridge_core::config::UpstreamAuthConfig;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};

use crate::error::{Error, Result};

/// Bearer-token per-RPC credentials.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    header: MetadataValue<Ascii>,
}

impl BearerAuth {
    /// Build credentials from a token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthConfig`] for an empty token or one that cannot
    /// form a valid header value.
    pub fn new(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(Error::AuthConfig("bearer token is empty".to_string()));
        }
        let header = format!("Bearer {token}")
            .parse()
            .map_err(|_| Error::AuthConfig("bearer token is not a valid header value".to_string()))?;
        Ok(Self { header })
    }
}

impl Interceptor for BearerAuth {
    fn call(&mut self, mut request: Request<()>) -> std::result::Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert("authorization", self.header.clone());
        Ok(request)
    }
}

/// Derive per-RPC credentials from an auth configuration.
///
/// Mutual TLS carries no per-RPC component, so it yields `None` here and is
/// consumed by channel construction instead.
///
/// # Errors
///
/// Returns [`Error::AuthConfig`] when the bearer variant is unusable.
pub fn per_rpc_credentials(auth: Option<&UpstreamAuthConfig>) -> Result<Option<BearerAuth>> {
    match auth {
        Some(UpstreamAuthConfig::BearerToken { token }) => Ok(Some(BearerAuth::new(token)?)),
        Some(UpstreamAuthConfig::Mtls { .. }) | None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_rejected() {
        let err = BearerAuth::new("").unwrap_err();
        assert!(matches!(err, Error::AuthConfig(_)), "got: {err}");
    }

    #[test]
    fn interceptor_attaches_authorization_header() {
        let mut auth = BearerAuth::new("s3cret").unwrap();
        let request = auth.call(Request::new(())).unwrap();
        assert_eq!(
            request.metadata().get("authorization").unwrap(),
            "Bearer s3cret"
        );
    }

    #[test]
    fn mtls_has_no_per_rpc_component() {
        let auth = UpstreamAuthConfig::Mtls {
            client_cert_path: "certs/client.pem".to_string(),
            client_key_path: "certs/client.key".to_string(),
            ca_cert_path: "certs/ca.pem".to_string(),
        };
        assert!(per_rpc_credentials(Some(&auth)).unwrap().is_none());
    }

    #[test]
    fn bearer_config_yields_credentials() {
        let auth = UpstreamAuthConfig::BearerToken {
            token: "s3cret".to_string(),
        };
        assert!(per_rpc_credentials(Some(&auth)).unwrap().is_some());
    }
}
