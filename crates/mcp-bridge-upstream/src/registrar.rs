//! Per-upstream registration orchestration.
//!
//! One [`Upstream`] owns the lifecycle of a single registered service:
//! identity derivation, pool construction, descriptor acquisition, tool and
//! prompt and resource materialization, and teardown. Registration aborts
//! on identity, pool, and descriptor failures; everything downstream of
//! that — a tool whose method does not resolve, a schema that will not
//! project, a duplicate catalog key — is logged with the offending name and
//! skipped.
//!
//! `register` and `shutdown` for the same upstream are not safe to run
//! concurrently; the embedding process serializes them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use mcp_bridge_core::annotations::{self, ToolHints};
use mcp_bridge_core::catalog::{
    PromptManager, PromptRecord, ResourceManager, ResourceRecord, ServiceInfo, ToolManager,
    ToolRecord,
};
use mcp_bridge_core::config::{
    CallConfig, PromptConfig, ResourceConfig, ToolConfig, UpstreamServiceConfig,
};
use mcp_bridge_core::{sanitize, DescriptorIndex, JsonSchema, SchemaType, ServiceIdentity};
use mcp_bridge_pool::{
    per_rpc_credentials, GrpcPool, GrpcPoolOptions, HealthChecker, PoolManager, SafeDialer,
};
use mcp_bridge_schema::{project_parameters, Projector};
use mcp_bridge_vector::{vector_tools, MilvusClient, PineconeClient, VectorClient};
use tokio_util::sync::CancellationToken;

use crate::cache::DescriptorCache;
use crate::error::{Error, Result};
use crate::loader::DescriptorLoader;
use crate::policy::ExportPolicy;

/// Construction options for an [`Upstream`].
#[derive(Clone, Default)]
pub struct UpstreamOptions {
    /// Connection opener injected into pools and the reflection loader.
    pub dialer: Option<SafeDialer>,
    /// Path policy for proto sources and TLS material; defaults to the
    /// process working directory.
    pub path_policy: Option<mcp_bridge_core::PathPolicy>,
    /// Upper bound on pooled connections per upstream.
    pub pool_max_size: usize,
    /// Connections constructed eagerly per upstream.
    pub pool_min_size: usize,
    /// Idle timeout for pooled connections; zero disables.
    pub pool_idle_timeout: std::time::Duration,
    /// Skip upstream health probing.
    pub disable_health_check: bool,
}

/// The outcome of a successful registration.
#[derive(Debug, Default)]
pub struct Registration {
    /// The in-process service ID (sanitized name); never empty on success.
    pub service_id: String,
    /// Tool records added by this registration, in declaration order.
    pub tools: Vec<ToolRecord>,
    /// Dynamic resources added by this registration.
    pub resources: Vec<ResourceRecord>,
}

struct RegisteredState {
    service_id: String,
    health: Option<Arc<HealthChecker>>,
}

/// Lifecycle owner for one upstream service.
pub struct Upstream {
    pools: Arc<PoolManager>,
    cache: Arc<DescriptorCache>,
    options: UpstreamOptions,
    state: Mutex<Option<RegisteredState>>,
}

impl Upstream {
    /// Create the lifecycle owner. The descriptor cache starts here and
    /// stops at [`Upstream::shutdown`]; construction therefore requires a
    /// tokio runtime.
    #[must_use]
    pub fn new(pools: Arc<PoolManager>, options: UpstreamOptions) -> Self {
        Self {
            pools,
            cache: Arc::new(DescriptorCache::with_default_ttl()),
            options,
            state: Mutex::new(None),
        }
    }

    /// Register the upstream described by `config` into the catalogs.
    ///
    /// On success the returned [`Registration`] carries a non-empty service
    /// ID plus the tools and resources added. On failure nothing of the
    /// abort point onward was added and the error wraps the root cause with
    /// the service name.
    ///
    /// # Errors
    ///
    /// Identity, pool-construction, and descriptor-acquisition failures
    /// abort registration; see [`Error`].
    pub async fn register(
        &self,
        cancel: &CancellationToken,
        config: &UpstreamServiceConfig,
        tools: &dyn ToolManager,
        prompts: &dyn PromptManager,
        resources: &dyn ResourceManager,
        is_reload: bool,
    ) -> Result<Registration> {
        self.register_inner(cancel, config, tools, prompts, resources, is_reload)
            .await
            .map_err(|source| Error::Registration {
                service: config.name.clone(),
                source: Box::new(source),
            })
    }

    async fn register_inner(
        &self,
        cancel: &CancellationToken,
        config: &UpstreamServiceConfig,
        tools: &dyn ToolManager,
        prompts: &dyn PromptManager,
        resources: &dyn ResourceManager,
        is_reload: bool,
    ) -> Result<Registration> {
        let identity = ServiceIdentity::derive(&config.name)?;
        let service_id = identity.sanitized_name.clone();

        let mut config = config.clone();
        config.id = identity.id;
        config.sanitized_name = service_id.clone();

        if let Ok(rendered) = serde_json::to_value(&config) {
            tracing::debug!(
                service_id = %service_id,
                config = %mcp_bridge_core::redact::redact_json(&rendered),
                "registering upstream service"
            );
        }

        if is_reload {
            tools.clear_tools_for_service(&service_id);
            prompts.clear_prompts_for_service(&service_id);
            resources.clear_resources_for_service(&service_id);
        }

        let registration = if config.grpc_service.is_some() {
            self.register_grpc(cancel, &config, &service_id, tools, prompts, resources)
                .await?
        } else if config.webrtc_service.is_some() {
            self.register_webrtc(&config, &service_id, tools, prompts, resources)?
        } else if config.vector_service.is_some() {
            self.register_vector(&config, &service_id, tools)?
        } else {
            return Err(Error::InvalidConfig(format!(
                "service '{}' declares no protocol block",
                config.name
            )));
        };

        tracing::info!(
            service_id = %service_id,
            tools = registration.tools.len(),
            resources = registration.resources.len(),
            "registered upstream service"
        );
        Ok(registration)
    }

    async fn register_grpc(
        &self,
        cancel: &CancellationToken,
        config: &UpstreamServiceConfig,
        service_id: &str,
        tools: &dyn ToolManager,
        prompts: &dyn PromptManager,
        resources: &dyn ResourceManager,
    ) -> Result<Registration> {
        let grpc = config
            .grpc_service
            .as_ref()
            .expect("caller checked the protocol block");
        let path_policy = self.path_policy()?;

        let health = Arc::new(HealthChecker::new(""));
        let credentials = per_rpc_credentials(config.upstream_auth.as_ref())?;
        let pool = GrpcPool::new(
            config,
            GrpcPoolOptions {
                min_size: self.options.pool_min_size,
                max_size: self.options.pool_max_size.max(1),
                idle_timeout: self.options.pool_idle_timeout,
                dialer: self.options.dialer.clone(),
                credentials,
                disable_health_check: self.options.disable_health_check,
                path_policy: Some(path_policy.clone()),
            },
            Arc::clone(&health),
        )?;
        self.pools.register(service_id, Arc::new(pool));
        *self.state.lock().expect("upstream state lock poisoned") = Some(RegisteredState {
            service_id: service_id.to_string(),
            health: Some(Arc::clone(&health)),
        });

        let loader = DescriptorLoader::new(
            Arc::clone(&self.cache),
            self.options.dialer.clone(),
            path_policy,
        );
        let descriptors = match loader.load(grpc, cancel).await {
            Ok(descriptors) => descriptors,
            Err(err) => {
                // Descriptor acquisition aborts the registration; don't
                // leave the pool behind for a service that never came up.
                self.pools.deregister(service_id);
                return Err(err);
            }
        };
        let index = DescriptorIndex::new((*descriptors).clone());

        tools.add_service_info(
            service_id,
            ServiceInfo {
                name: config.name.clone(),
                config: config.clone(),
                descriptors: Some(Arc::clone(&descriptors)),
            },
        );

        let tool_policy = ExportPolicy::from_config(config.tool_export_policy.as_ref())?;
        let mut assembler = ToolAssembler {
            service_id,
            policy: &tool_policy,
            overrides: &grpc.tools,
            resilience: config.resilience.as_ref(),
            catalog: tools,
            added: Vec::new(),
        };

        let projector = Projector::new(&index);
        let extracted = annotations::extract(&index);

        // Annotation tools first, in declaration order.
        for annotation in extracted.tools.iter().filter(|t| t.annotated) {
            assembler.add_descriptor_tool(&index, &projector, &annotation.name, annotation);
        }

        // Auto-discovered tools next: every method without an annotation,
        // named by its sanitized full method path.
        if config.auto_discover_tool {
            for annotation in extracted.tools.iter().filter(|t| !t.annotated) {
                let Ok(name) = sanitize(&annotation.full_method()) else {
                    tracing::warn!(method = %annotation.full_method(), "skipping tool with unusable name");
                    continue;
                };
                assembler.add_descriptor_tool(&index, &projector, &name, annotation);
            }
        }

        // Config-defined calls last.
        for (call_id, call) in &grpc.calls {
            assembler.add_call_tool(Some((&index, &projector)), call_id, call);
        }

        let added_tools = assembler.added;
        emit_prompts(config, service_id, &grpc.prompts, &extracted.prompts, prompts)?;
        let added_resources = emit_resources(
            service_id,
            &grpc.tools,
            grpc.calls.keys(),
            &grpc.resources,
            tools,
            resources,
        );

        Ok(Registration {
            service_id: service_id.to_string(),
            tools: added_tools,
            resources: added_resources,
        })
    }

    fn register_webrtc(
        &self,
        config: &UpstreamServiceConfig,
        service_id: &str,
        tools: &dyn ToolManager,
        prompts: &dyn PromptManager,
        resources: &dyn ResourceManager,
    ) -> Result<Registration> {
        let webrtc = config
            .webrtc_service
            .as_ref()
            .expect("caller checked the protocol block");
        if webrtc.address.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "service '{}' has an empty upstream address",
                config.name
            )));
        }
        *self.state.lock().expect("upstream state lock poisoned") = Some(RegisteredState {
            service_id: service_id.to_string(),
            health: None,
        });

        tools.add_service_info(
            service_id,
            ServiceInfo {
                name: config.name.clone(),
                config: config.clone(),
                descriptors: None,
            },
        );

        let tool_policy = ExportPolicy::from_config(config.tool_export_policy.as_ref())?;
        let mut assembler = ToolAssembler {
            service_id,
            policy: &tool_policy,
            overrides: &webrtc.tools,
            resilience: config.resilience.as_ref(),
            catalog: tools,
            added: Vec::new(),
        };

        // No descriptors exist for this protocol; every tool comes from a
        // declarative call definition.
        for (call_id, call) in &webrtc.calls {
            assembler.add_call_tool(None, call_id, call);
        }

        let added_tools = assembler.added;
        emit_prompts(config, service_id, &webrtc.prompts, &[], prompts)?;
        let added_resources = emit_resources(
            service_id,
            &webrtc.tools,
            webrtc.calls.keys(),
            &webrtc.resources,
            tools,
            resources,
        );

        Ok(Registration {
            service_id: service_id.to_string(),
            tools: added_tools,
            resources: added_resources,
        })
    }

    fn register_vector(
        &self,
        config: &UpstreamServiceConfig,
        service_id: &str,
        tools: &dyn ToolManager,
    ) -> Result<Registration> {
        let vector = config
            .vector_service
            .as_ref()
            .expect("caller checked the protocol block");

        let client: Arc<dyn VectorClient> = if let Some(pinecone) = &vector.pinecone {
            Arc::new(PineconeClient::new(pinecone)?)
        } else if let Some(milvus) = &vector.milvus {
            Arc::new(MilvusClient::new(milvus)?)
        } else {
            return Err(Error::InvalidConfig(format!(
                "service '{}' declares no vector backend",
                config.name
            )));
        };

        *self.state.lock().expect("upstream state lock poisoned") = Some(RegisteredState {
            service_id: service_id.to_string(),
            health: None,
        });

        tools.add_service_info(
            service_id,
            ServiceInfo {
                name: config.name.clone(),
                config: config.clone(),
                descriptors: None,
            },
        );

        let tool_policy = ExportPolicy::from_config(config.tool_export_policy.as_ref())?;
        let mut added = Vec::new();
        for mut record in vector_tools(service_id, client) {
            if !tool_policy.allows(&record.name) {
                tracing::debug!(tool = %record.name, "tool excluded by export policy");
                continue;
            }
            if tools.tool(&record.key).is_some() {
                tracing::debug!(key = %record.key, "skipping duplicate tool key");
                continue;
            }
            record.resilience = config.resilience.clone();
            match tools.add_tool(record.clone()) {
                Ok(()) => added.push(record),
                Err(err) => {
                    tracing::warn!(key = %record.key, error = %err, "failed to add tool");
                }
            }
        }

        Ok(Registration {
            service_id: service_id.to_string(),
            tools: added,
            resources: Vec::new(),
        })
    }

    fn path_policy(&self) -> Result<mcp_bridge_core::PathPolicy> {
        match &self.options.path_policy {
            Some(policy) => Ok(policy.clone()),
            None => Ok(mcp_bridge_core::PathPolicy::current_dir()?),
        }
    }

    /// Tear the upstream down: stop the descriptor cache and deregister the
    /// pool (which closes it and stops its health checker). Idempotent.
    pub fn shutdown(&self) {
        self.cache.stop();
        if let Some(state) = self.state.lock().expect("upstream state lock poisoned").take() {
            self.pools.deregister(&state.service_id);
            if let Some(health) = state.health {
                health.stop();
            }
        }
    }

    /// Probe the registered upstream's health.
    ///
    /// Succeeds when no checker is present (vector and WebRTC upstreams,
    /// or nothing registered yet).
    ///
    /// # Errors
    ///
    /// Surfaces pool borrowing failures and non-serving statuses.
    pub async fn check_health(&self, cancel: &CancellationToken) -> Result<()> {
        let (service_id, has_checker) = {
            let state = self.state.lock().expect("upstream state lock poisoned");
            match state.as_ref() {
                Some(state) => (state.service_id.clone(), state.health.is_some()),
                None => return Ok(()),
            }
        };
        if !has_checker {
            return Ok(());
        }
        let Some(pool) = self.pools.get(&service_id) else {
            return Ok(());
        };

        let client = pool.get(cancel).await?;
        let outcome = client.check_health().await;
        pool.put(client);
        outcome.map_err(Error::Pool)
    }
}

/// Shared per-tool materialization: export policy, disable switches,
/// duplicate suppression, and catalog insertion.
struct ToolAssembler<'a> {
    service_id: &'a str,
    policy: &'a ExportPolicy,
    overrides: &'a [ToolConfig],
    resilience: Option<&'a serde_json::Value>,
    catalog: &'a dyn ToolManager,
    added: Vec<ToolRecord>,
}

impl ToolAssembler<'_> {
    fn override_for(&self, name: &str) -> Option<&ToolConfig> {
        self.overrides.iter().find(|t| t.name == name)
    }

    fn override_for_call(&self, call_id: &str) -> Option<&ToolConfig> {
        self.overrides.iter().find(|t| t.call_id == call_id)
    }

    /// Materialize one descriptor-backed tool; failures log and skip.
    fn add_descriptor_tool(
        &mut self,
        index: &DescriptorIndex,
        projector: &Projector<'_>,
        name: &str,
        annotation: &annotations::ToolAnnotation,
    ) {
        let full_method = annotation.full_method();
        let method = match index.resolve_method(&full_method) {
            Ok(method) => method,
            Err(err) => {
                tracing::warn!(tool = %name, method = %full_method, error = %err, "skipping tool: method does not resolve");
                return;
            }
        };

        let input_schema = match projector.message_schema(&method.input_fqn) {
            Ok(schema) => schema,
            Err(err) => {
                tracing::warn!(tool = %name, error = %err, "skipping tool: request schema projection failed");
                return;
            }
        };
        let output_schema = match projector.message_schema(&method.output_fqn) {
            Ok(schema) => schema,
            Err(err) => {
                tracing::warn!(tool = %name, error = %err, "skipping tool: response schema projection failed");
                return;
            }
        };

        let override_config = self.override_for(name).cloned();
        let description = override_config
            .as_ref()
            .map(|o| o.description.clone())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| annotation.description.clone());
        let hints = merge_hints(annotation.hints, override_config.as_ref());

        self.push(
            name,
            override_config.as_ref(),
            description,
            full_method,
            Some(annotation.input_type.clone()),
            Some(annotation.output_type.clone()),
            input_schema,
            output_schema,
            hints,
        );
    }

    /// Materialize one config-defined call tool; failures log and skip.
    fn add_call_tool(
        &mut self,
        descriptors: Option<(&DescriptorIndex, &Projector<'_>)>,
        call_id: &str,
        call: &CallConfig,
    ) {
        let override_config = self.override_for_call(call_id).cloned();
        let name = override_config
            .as_ref()
            .map_or(call_id, |o| o.name.as_str())
            .to_string();
        let full_method = format!("{}/{}", call.service, call.method);

        let resolved = match descriptors {
            Some((index, _)) => match index.resolve_method(&full_method) {
                Ok(method) => Some(method),
                Err(err) => {
                    tracing::warn!(tool = %name, method = %full_method, error = %err, "skipping call tool: method does not resolve");
                    return;
                }
            },
            None => None,
        };

        let input_schema = if let Some(schema) = &call.input_schema {
            schema.clone()
        } else if call.parameters.is_empty() {
            match (descriptors, &resolved) {
                (Some((_, projector)), Some(method)) => {
                    match projector.message_schema(&method.input_fqn) {
                        Ok(schema) => schema,
                        Err(err) => {
                            tracing::warn!(tool = %name, error = %err, "skipping call tool: request schema projection failed");
                            return;
                        }
                    }
                }
                _ => JsonSchema::of(SchemaType::Object),
            }
        } else {
            let (mut schema, required) = project_parameters(&call.parameters);
            schema.required = required;
            schema
        };

        let output_schema = match (descriptors, &resolved) {
            (Some((_, projector)), Some(method)) => {
                match projector.message_schema(&method.output_fqn) {
                    Ok(schema) => schema,
                    Err(err) => {
                        tracing::warn!(tool = %name, error = %err, "skipping call tool: response schema projection failed");
                        return;
                    }
                }
            }
            _ => JsonSchema::of(SchemaType::Object),
        };

        let description = override_config
            .as_ref()
            .map(|o| o.description.clone())
            .unwrap_or_default();
        let hints = merge_hints(ToolHints::default(), override_config.as_ref());
        let request_type = resolved.as_ref().map(|m| m.input_fqn.clone());
        let response_type = resolved.as_ref().map(|m| m.output_fqn.clone());

        self.push(
            &name,
            override_config.as_ref(),
            description,
            full_method,
            request_type,
            response_type,
            input_schema,
            output_schema,
            hints,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        name: &str,
        override_config: Option<&ToolConfig>,
        description: String,
        method_fqn: String,
        request_type: Option<String>,
        response_type: Option<String>,
        input_schema: JsonSchema,
        output_schema: JsonSchema,
        hints: ToolHints,
    ) {
        if override_config.is_some_and(|o| o.disable) {
            tracing::debug!(tool = %name, "tool disabled by configuration");
            return;
        }
        if !self.policy.allows(name) {
            tracing::debug!(tool = %name, "tool excluded by export policy");
            return;
        }

        let key = match sanitize(name) {
            Ok(sanitized) => format!("{}.{sanitized}", self.service_id),
            Err(err) => {
                tracing::warn!(tool = %name, error = %err, "skipping tool with unusable name");
                return;
            }
        };
        if self.catalog.tool(&key).is_some() {
            tracing::debug!(key = %key, "skipping duplicate tool key");
            return;
        }

        let record = ToolRecord {
            key,
            name: name.to_string(),
            description,
            service_id: self.service_id.to_string(),
            method_fqn,
            request_type,
            response_type,
            input_schema,
            output_schema,
            hints,
            resilience: self.resilience.cloned(),
            handler: None,
        };
        match self.catalog.add_tool(record.clone()) {
            Ok(()) => self.added.push(record),
            Err(err) => {
                tracing::warn!(key = %record.key, error = %err, "failed to add tool");
            }
        }
    }
}

fn merge_hints(base: ToolHints, override_config: Option<&ToolConfig>) -> ToolHints {
    let Some(config) = override_config else {
        return base;
    };
    ToolHints {
        read_only: base.read_only || config.read_only_hint,
        destructive: base.destructive || config.destructive_hint,
        idempotent: base.idempotent || config.idempotent_hint,
        open_world: base.open_world || config.open_world_hint,
    }
}

fn emit_prompts(
    config: &UpstreamServiceConfig,
    service_id: &str,
    configured: &[PromptConfig],
    extracted: &[annotations::PromptAnnotation],
    prompts: &dyn PromptManager,
) -> Result<()> {
    let policy = ExportPolicy::from_config(config.prompt_export_policy.as_ref())?;

    for annotation in extracted {
        add_prompt(
            prompts,
            &policy,
            service_id,
            &annotation.name,
            &annotation.description,
            None,
        );
    }

    for prompt in configured {
        if prompt.name.is_empty() {
            tracing::warn!(service_id, "skipping prompt with an empty name");
            continue;
        }
        if prompt.disable {
            continue;
        }
        add_prompt(
            prompts,
            &policy,
            service_id,
            &prompt.name,
            &prompt.description,
            prompt.template.clone(),
        );
    }
    Ok(())
}

fn add_prompt(
    prompts: &dyn PromptManager,
    policy: &ExportPolicy,
    service_id: &str,
    name: &str,
    description: &str,
    template: Option<serde_json::Value>,
) {
    if !policy.allows(name) {
        tracing::debug!(prompt = %name, "prompt excluded by export policy");
        return;
    }
    let record = PromptRecord {
        key: format!("{service_id}.{name}"),
        name: name.to_string(),
        description: description.to_string(),
        service_id: service_id.to_string(),
        template,
    };
    if let Err(err) = prompts.add_prompt(record) {
        tracing::warn!(prompt = %name, error = %err, "failed to add prompt");
    }
}

/// Resolve dynamic resources against the registered tools; every failure
/// logs and continues.
fn emit_resources<'a>(
    service_id: &str,
    tool_configs: &[ToolConfig],
    call_ids: impl Iterator<Item = &'a String>,
    configured: &[ResourceConfig],
    tools: &dyn ToolManager,
    resources: &dyn ResourceManager,
) -> Vec<ResourceRecord> {
    // Call ID → tool name, from explicit tool bindings first, then bare
    // call IDs.
    let mut call_tools: HashMap<&str, &str> = HashMap::new();
    for tool in tool_configs {
        if !tool.call_id.is_empty() {
            call_tools.insert(tool.call_id.as_str(), tool.name.as_str());
        }
    }
    for call_id in call_ids {
        call_tools.entry(call_id.as_str()).or_insert(call_id.as_str());
    }

    let mut added = Vec::new();
    let mut seen_names: HashSet<&str> = HashSet::new();
    for resource in configured {
        if resource.disable {
            continue;
        }
        if !seen_names.insert(resource.name.as_str()) {
            tracing::warn!(resource = %resource.name, "skipping duplicate resource name");
            continue;
        }
        let Some(call_id) = resource.dynamic.as_ref().and_then(|d| d.call_id()) else {
            tracing::warn!(resource = %resource.name, "skipping resource without a call reference");
            continue;
        };
        let Some(tool_name) = call_tools.get(call_id) else {
            tracing::warn!(resource = %resource.name, call_id, "skipping resource: unknown call id");
            continue;
        };
        let Ok(sanitized) = sanitize(tool_name) else {
            tracing::warn!(resource = %resource.name, tool = %tool_name, "skipping resource: unusable tool name");
            continue;
        };

        let tool_key = format!("{service_id}.{sanitized}");
        if tools.tool(&tool_key).is_none() {
            tracing::warn!(resource = %resource.name, key = %tool_key, "skipping resource: tool is not registered");
            continue;
        }

        let record = ResourceRecord {
            key: format!("{service_id}.{}", resource.name),
            name: resource.name.clone(),
            service_id: service_id.to_string(),
            tool_key,
        };
        match resources.add_resource(record.clone()) {
            Ok(()) => added.push(record),
            Err(err) => {
                tracing::warn!(resource = %record.name, error = %err, "failed to add resource");
            }
        }
    }
    added
}
