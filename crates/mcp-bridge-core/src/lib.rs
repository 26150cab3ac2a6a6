//! Shared types for the mcp-bridge gateway: descriptor protos with gateway
//! annotation extensions, the descriptor lookup index, annotation
//! extraction, service identity, catalog records and manager seams, the
//! declarative service configuration model, safe-path validation, the
//! JSON-schema value type, and boundary-log redaction.
//!
//! Higher layers build on these: `mcp-bridge-schema` projects descriptors
//! into schemas, `mcp-bridge-pool` manages upstream connections, and
//! `mcp-bridge-upstream` orchestrates registration.

pub mod annotations;
pub mod catalog;
pub mod config;
pub mod descriptor;
mod error;
pub mod identity;
pub mod index;
pub mod pathsafe;
pub mod redact;
pub mod schema;

pub use error::{Error, Result};
pub use identity::{sanitize, sha256_hex, ServiceIdentity};
pub use index::{DescriptorIndex, MethodRef};
pub use pathsafe::PathPolicy;
pub use schema::{JsonSchema, SchemaType};
