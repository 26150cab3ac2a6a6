//! Catalog records and the manager seams the registrar writes into.
//!
//! The gateway core never owns the catalogs: it receives [`ToolManager`],
//! [`PromptManager`], and [`ResourceManager`] implementations and appends
//! records during registration. Records are immutable after insertion;
//! replacement requires a clear-and-reload cycle. The in-memory managers
//! here back tests and embedders that have no catalog of their own.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::annotations::ToolHints;
use crate::config::UpstreamServiceConfig;
use crate::descriptor::FileDescriptorSet;
use crate::schema::JsonSchema;

/// Failure from a tool handler invocation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ToolCallError {
    /// A caller-supplied argument could not be coerced.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The upstream rejected or failed the call.
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Executable side of a tool record.
///
/// Only tools with a concrete in-process binding (the vector-database tools)
/// install a handler; protocol tools carry routing metadata instead and are
/// invoked by the downstream surface.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invoke the tool with loosely-typed caller arguments.
    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolCallError>;
}

/// The unit of executable capability projected into the catalog.
#[derive(Clone)]
pub struct ToolRecord {
    /// Catalog key: `serviceID + "." + sanitize(toolName)`.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Owning service ID (the sanitized service name).
    pub service_id: String,
    /// Underlying `service/Method` path for invocation routing; empty for
    /// tools without a protocol binding.
    pub method_fqn: String,
    /// Fully-qualified request type name, when protobuf-bound.
    pub request_type: Option<String>,
    /// Fully-qualified response type name, when protobuf-bound.
    pub response_type: Option<String>,
    /// Input schema.
    pub input_schema: JsonSchema,
    /// Output schema.
    pub output_schema: JsonSchema,
    /// Behavior hints.
    pub hints: ToolHints,
    /// Opaque resilience settings, passed through from configuration.
    pub resilience: Option<serde_json::Value>,
    /// Executable binding, when the tool is handled in-process.
    pub handler: Option<Arc<dyn ToolHandler>>,
}

impl fmt::Debug for ToolRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRecord")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("service_id", &self.service_id)
            .field("method_fqn", &self.method_fqn)
            .field("handler", &self.handler.as_ref().map(|_| "…"))
            .finish_non_exhaustive()
    }
}

/// A prompt projected into the catalog, opaque beyond its name.
#[derive(Debug, Clone)]
pub struct PromptRecord {
    /// Catalog key: `serviceID + "." + name`.
    pub key: String,
    /// Prompt name without the service prefix.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Owning service ID.
    pub service_id: String,
    /// Templated content, passed through from configuration.
    pub template: Option<serde_json::Value>,
}

/// A dynamic resource: a named reference to a registered tool.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    /// Catalog key: `serviceID + "." + name`.
    pub key: String,
    /// Resource name without the service prefix.
    pub name: String,
    /// Owning service ID.
    pub service_id: String,
    /// Catalog key of the tool this resource resolves through.
    pub tool_key: String,
}

/// Descriptor-backed metadata published per registered service.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Raw service name.
    pub name: String,
    /// The configuration the service was registered with (IDs filled in).
    pub config: UpstreamServiceConfig,
    /// The closed descriptor set, when the protocol has one.
    pub descriptors: Option<Arc<FileDescriptorSet>>,
}

/// Tool catalog seam. Implementations must tolerate concurrent `add_tool`
/// from registrations of distinct services.
pub trait ToolManager: Send + Sync {
    /// Insert a tool. Duplicate keys are rejected by the caller beforehand;
    /// managers may still refuse for their own reasons.
    fn add_tool(&self, tool: ToolRecord) -> crate::Result<()>;

    /// Fetch a tool by catalog key.
    fn tool(&self, key: &str) -> Option<ToolRecord>;

    /// All tools, in insertion order.
    fn list_tools(&self) -> Vec<ToolRecord>;

    /// Publish service metadata under a service ID.
    fn add_service_info(&self, service_id: &str, info: ServiceInfo);

    /// Fetch service metadata.
    fn service_info(&self, service_id: &str) -> Option<ServiceInfo>;

    /// Drop every tool owned by a service. Used on reload.
    fn clear_tools_for_service(&self, service_id: &str);
}

/// Prompt catalog seam.
pub trait PromptManager: Send + Sync {
    /// Insert a prompt.
    fn add_prompt(&self, prompt: PromptRecord) -> crate::Result<()>;

    /// Fetch a prompt by catalog key.
    fn prompt(&self, key: &str) -> Option<PromptRecord>;

    /// All prompts, in insertion order.
    fn list_prompts(&self) -> Vec<PromptRecord>;

    /// Drop every prompt owned by a service. Used on reload.
    fn clear_prompts_for_service(&self, service_id: &str);
}

/// Resource catalog seam.
pub trait ResourceManager: Send + Sync {
    /// Insert a resource.
    fn add_resource(&self, resource: ResourceRecord) -> crate::Result<()>;

    /// Fetch a resource by catalog key.
    fn resource(&self, key: &str) -> Option<ResourceRecord>;

    /// All resources, in insertion order.
    fn list_resources(&self) -> Vec<ResourceRecord>;

    /// Drop every resource owned by a service. Used on reload.
    fn clear_resources_for_service(&self, service_id: &str);
}

/// In-memory tool catalog.
#[derive(Default)]
pub struct InMemoryToolManager {
    tools: RwLock<Vec<ToolRecord>>,
    infos: RwLock<HashMap<String, ServiceInfo>>,
}

impl InMemoryToolManager {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ToolManager for InMemoryToolManager {
    fn add_tool(&self, tool: ToolRecord) -> crate::Result<()> {
        let mut tools = self.tools.write().expect("tool catalog lock poisoned");
        if tools.iter().any(|t| t.key == tool.key) {
            return Err(crate::Error::Catalog {
                key: tool.key,
                reason: "duplicate key".to_string(),
            });
        }
        tools.push(tool);
        Ok(())
    }

    fn tool(&self, key: &str) -> Option<ToolRecord> {
        self.tools
            .read()
            .expect("tool catalog lock poisoned")
            .iter()
            .find(|t| t.key == key)
            .cloned()
    }

    fn list_tools(&self) -> Vec<ToolRecord> {
        self.tools
            .read()
            .expect("tool catalog lock poisoned")
            .clone()
    }

    fn add_service_info(&self, service_id: &str, info: ServiceInfo) {
        self.infos
            .write()
            .expect("service info lock poisoned")
            .insert(service_id.to_string(), info);
    }

    fn service_info(&self, service_id: &str) -> Option<ServiceInfo> {
        self.infos
            .read()
            .expect("service info lock poisoned")
            .get(service_id)
            .cloned()
    }

    fn clear_tools_for_service(&self, service_id: &str) {
        self.tools
            .write()
            .expect("tool catalog lock poisoned")
            .retain(|t| t.service_id != service_id);
        self.infos
            .write()
            .expect("service info lock poisoned")
            .remove(service_id);
    }
}

/// In-memory prompt catalog.
#[derive(Default)]
pub struct InMemoryPromptManager {
    prompts: RwLock<Vec<PromptRecord>>,
}

impl InMemoryPromptManager {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PromptManager for InMemoryPromptManager {
    fn add_prompt(&self, prompt: PromptRecord) -> crate::Result<()> {
        let mut prompts = self.prompts.write().expect("prompt catalog lock poisoned");
        if prompts.iter().any(|p| p.key == prompt.key) {
            return Err(crate::Error::Catalog {
                key: prompt.key,
                reason: "duplicate key".to_string(),
            });
        }
        prompts.push(prompt);
        Ok(())
    }

    fn prompt(&self, key: &str) -> Option<PromptRecord> {
        self.prompts
            .read()
            .expect("prompt catalog lock poisoned")
            .iter()
            .find(|p| p.key == key)
            .cloned()
    }

    fn list_prompts(&self) -> Vec<PromptRecord> {
        self.prompts
            .read()
            .expect("prompt catalog lock poisoned")
            .clone()
    }

    fn clear_prompts_for_service(&self, service_id: &str) {
        self.prompts
            .write()
            .expect("prompt catalog lock poisoned")
            .retain(|p| p.service_id != service_id);
    }
}

/// In-memory resource catalog.
#[derive(Default)]
pub struct InMemoryResourceManager {
    resources: RwLock<Vec<ResourceRecord>>,
}

impl InMemoryResourceManager {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceManager for InMemoryResourceManager {
    fn add_resource(&self, resource: ResourceRecord) -> crate::Result<()> {
        let mut resources = self
            .resources
            .write()
            .expect("resource catalog lock poisoned");
        if resources.iter().any(|r| r.key == resource.key) {
            return Err(crate::Error::Catalog {
                key: resource.key,
                reason: "duplicate key".to_string(),
            });
        }
        resources.push(resource);
        Ok(())
    }

    fn resource(&self, key: &str) -> Option<ResourceRecord> {
        self.resources
            .read()
            .expect("resource catalog lock poisoned")
            .iter()
            .find(|r| r.key == key)
            .cloned()
    }

    fn list_resources(&self) -> Vec<ResourceRecord> {
        self.resources
            .read()
            .expect("resource catalog lock poisoned")
            .clone()
    }

    fn clear_resources_for_service(&self, service_id: &str) {
        self.resources
            .write()
            .expect("resource catalog lock poisoned")
            .retain(|r| r.service_id != service_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(key: &str, service_id: &str) -> ToolRecord {
        ToolRecord {
            key: key.to_string(),
            name: key.rsplit('.').next().unwrap_or(key).to_string(),
            description: String::new(),
            service_id: service_id.to_string(),
            method_fqn: String::new(),
            request_type: None,
            response_type: None,
            input_schema: JsonSchema::default(),
            output_schema: JsonSchema::default(),
            hints: ToolHints::default(),
            resilience: None,
            handler: None,
        }
    }

    #[test]
    fn add_and_fetch_tool() {
        let mgr = InMemoryToolManager::new();
        mgr.add_tool(tool("svc.GetWeather", "svc")).unwrap();
        assert!(mgr.tool("svc.GetWeather").is_some());
        assert!(mgr.tool("svc.Other").is_none());
    }

    #[test]
    fn duplicate_key_rejected() {
        let mgr = InMemoryToolManager::new();
        mgr.add_tool(tool("svc.GetWeather", "svc")).unwrap();
        let err = mgr.add_tool(tool("svc.GetWeather", "svc")).unwrap_err();
        assert!(matches!(err, crate::Error::Catalog { .. }), "got: {err}");
    }

    #[test]
    fn clear_removes_only_owned_tools() {
        let mgr = InMemoryToolManager::new();
        mgr.add_tool(tool("a.One", "a")).unwrap();
        mgr.add_tool(tool("b.Two", "b")).unwrap();

        mgr.clear_tools_for_service("a");
        assert!(mgr.tool("a.One").is_none());
        assert!(mgr.tool("b.Two").is_some());
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mgr = InMemoryToolManager::new();
        mgr.add_tool(tool("svc.A", "svc")).unwrap();
        mgr.add_tool(tool("svc.B", "svc")).unwrap();
        let keys: Vec<String> = mgr.list_tools().into_iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["svc.A", "svc.B"]);
    }

    #[test]
    fn prompt_and_resource_catalogs_clear_by_service() {
        let prompts = InMemoryPromptManager::new();
        prompts
            .add_prompt(PromptRecord {
                key: "svc.briefing".to_string(),
                name: "briefing".to_string(),
                description: String::new(),
                service_id: "svc".to_string(),
                template: None,
            })
            .unwrap();

        let resources = InMemoryResourceManager::new();
        resources
            .add_resource(ResourceRecord {
                key: "svc.latest".to_string(),
                name: "latest".to_string(),
                service_id: "svc".to_string(),
                tool_key: "svc.GetWeather".to_string(),
            })
            .unwrap();

        prompts.clear_prompts_for_service("svc");
        resources.clear_resources_for_service("svc");
        assert!(prompts.list_prompts().is_empty());
        assert!(resources.list_resources().is_empty());
    }
}
