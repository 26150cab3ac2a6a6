//! Mutual-TLS channel credentials.
//!
//! Certificate, key, and CA paths come from user configuration, so every
//! path passes the [`PathPolicy`] check before any file is read. PEM
//! material is loaded fresh at each factory invocation; rotated files are
//! picked up by the next client construction without a restart.
//!
//! The rustls ring provider negotiates TLS 1.2 or newer.

use std::path::Path;

use mcp_bridge_core::PathPolicy;
use tonic::transport::{Certificate, ClientTlsConfig, Identity};

use crate::error::Result;

/// Load mutual-TLS credentials for a channel.
///
/// # Errors
///
/// Returns a path-validation error when any of the three paths fails the
/// policy check, or an I/O error when the PEM files cannot be read.
pub fn mtls_config(
    policy: &PathPolicy,
    client_cert_path: &str,
    client_key_path: &str,
    ca_cert_path: &str,
) -> Result<ClientTlsConfig> {
    let cert_path = policy.check(Path::new(client_cert_path))?;
    let key_path = policy.check(Path::new(client_key_path))?;
    let ca_path = policy.check(Path::new(ca_cert_path))?;

    let cert = std::fs::read(cert_path)?;
    let key = std::fs::read(key_path)?;
    let ca = std::fs::read(ca_path)?;

    Ok(ClientTlsConfig::new()
        .identity(Identity::from_pem(cert, key))
        .ca_certificate(Certificate::from_pem(ca)))
}
