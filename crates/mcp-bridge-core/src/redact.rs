//! Sensitive-value redaction for boundary logs.
//!
//! Service configurations carry tokens, keys, and passwords. Anything
//! logged at the registration boundary passes through [`redact_json`]
//! first: values under keys whose names contain a sensitive token are
//! replaced with a placeholder, recursively through objects and arrays.
//! Input without sensitive keys comes back structurally unchanged.

use serde_json::Value;

/// Substrings (case-insensitive) that mark a key as sensitive.
const SENSITIVE_TOKENS: &[&str] = &[
    "token",
    "secret",
    "password",
    "api_key",
    "apikey",
    "authorization",
    "credential",
    "key",
];

/// The value substituted for redacted entries.
pub const PLACEHOLDER: &str = "[REDACTED]";

/// Whether a key name marks its value as sensitive.
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_TOKENS.iter().any(|t| lowered.contains(t))
}

/// Replace sensitive values in a JSON document with [`PLACEHOLDER`].
#[must_use]
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String(PLACEHOLDER.to_string()))
                    } else {
                        (key.clone(), redact_json(val))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        other => other.clone(),
    }
}
