//! JSON-schema projection for the mcp-bridge gateway.
//!
//! Converts protobuf message descriptors, declarative call parameters, and
//! annotated field snapshots into the [`JsonSchema`] value type from
//! [`mcp_bridge_core`]. The projection is deterministic and bounded: equal
//! inputs yield equal schemas, and message nesting deeper than
//! [`MAX_NESTING_DEPTH`] fails rather than recursing forever.
//!
//! [`JsonSchema`]: mcp_bridge_core::JsonSchema

mod error;
mod project;

pub use error::{Error, Result};
pub use project::{
    project_annotated_field, project_parameters, Projector, MAX_NESTING_DEPTH,
};
