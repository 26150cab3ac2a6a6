//! Upstream registration orchestration for the mcp-bridge gateway.
//!
//! An [`Upstream`] projects one remote service — gRPC, WebRTC data
//! channels, or a vector database — into the gateway catalog as tools,
//! prompts, and resources. gRPC descriptors arrive either over server
//! reflection (cached per endpoint, see [`DescriptorCache`]) or from proto
//! sources compiled in-process; schemas come from
//! [`mcp_bridge_schema`]; connections flow through
//! [`mcp_bridge_pool`] pools keyed by service ID.

mod cache;
mod error;
mod loader;
mod policy;
mod reflection;
mod registrar;
mod sources;

pub use cache::{DescriptorCache, DEFAULT_TTL};
pub use error::{Error, Result};
pub use loader::DescriptorLoader;
pub use policy::ExportPolicy;
pub use reflection::{discover, REFLECTION_DEADLINE};
pub use registrar::{Registration, Upstream, UpstreamOptions};
pub use sources::compile_sources;
