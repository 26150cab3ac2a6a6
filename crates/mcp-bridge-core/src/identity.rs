//! Service identity derivation: content hash plus sanitized name.
//!
//! The raw service name from configuration is user-supplied and may contain
//! arbitrary characters. Two deterministic projections are derived from it:
//!
//! - a **durable ID**: the SHA-256 hex digest of the raw name, stable across
//!   renames of everything but the name itself;
//! - a **sanitized name**: the raw name restricted to `[A-Za-z0-9_-]`, used
//!   as the in-process service ID and catalog key prefix.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Identity derived from a raw service name. Immutable for a given name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    /// SHA-256 hex digest of the raw name.
    pub id: String,
    /// Charset-restricted name used for catalog keys; never empty.
    pub sanitized_name: String,
}

impl ServiceIdentity {
    /// Derive the identity for a raw service name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if the name is empty or sanitizes to
    /// an empty string.
    pub fn derive(name: &str) -> Result<Self> {
        let sanitized_name = sanitize(name)?;
        Ok(Self {
            id: sha256_hex(name),
            sanitized_name,
        })
    }
}

/// SHA-256 digest of a string, rendered as lowercase hex.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Restrict a name to `[A-Za-z0-9_-]`.
///
/// Every run of characters outside the charset collapses to a single `_`;
/// leading and trailing `_` produced by the collapse are trimmed. The
/// transform is deterministic: equal inputs yield equal outputs.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] if the input is empty or the result
/// would be empty.
pub fn sanitize(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::InvalidName {
            name: name.to_string(),
        });
    }

    let mut out = String::with_capacity(name.len());
    let mut pending_gap = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            if pending_gap && !out.is_empty() {
                out.push('_');
            }
            pending_gap = false;
            out.push(c);
        } else {
            pending_gap = true;
        }
    }

    if out.is_empty() {
        return Err(Error::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(out)
}
