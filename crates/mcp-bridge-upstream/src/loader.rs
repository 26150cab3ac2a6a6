//! Descriptor acquisition: reflection or compiled sources.
//!
//! The configuration flag `use_reflection` selects the path. Reflection
//! results are cached per endpoint address; the source path always
//! recompiles (disk is the source of truth there).

use std::sync::Arc;

use mcp_bridge_core::config::GrpcServiceConfig;
use mcp_bridge_core::descriptor::FileDescriptorSet;
use mcp_bridge_core::PathPolicy;
use mcp_bridge_pool::SafeDialer;
use tokio_util::sync::CancellationToken;

use crate::cache::DescriptorCache;
use crate::error::Result;
use crate::{reflection, sources};

/// Loads closed descriptor sets for gRPC upstreams.
pub struct DescriptorLoader {
    cache: Arc<DescriptorCache>,
    dialer: Option<SafeDialer>,
    policy: PathPolicy,
}

impl DescriptorLoader {
    /// A loader over the given cache, dialer, and path policy.
    #[must_use]
    pub fn new(
        cache: Arc<DescriptorCache>,
        dialer: Option<SafeDialer>,
        policy: PathPolicy,
    ) -> Self {
        Self {
            cache,
            dialer,
            policy,
        }
    }

    /// Obtain the descriptor set for a gRPC upstream.
    ///
    /// # Errors
    ///
    /// See [`reflection::discover`] and [`sources::compile_sources`].
    pub async fn load(
        &self,
        grpc: &GrpcServiceConfig,
        cancel: &CancellationToken,
    ) -> Result<Arc<FileDescriptorSet>> {
        if grpc.use_reflection {
            if let Some(cached) = self.cache.get(&grpc.address) {
                tracing::debug!(address = %grpc.address, "descriptor cache hit");
                return Ok(cached);
            }
            let set = Arc::new(
                reflection::discover(&grpc.address, self.dialer.as_ref(), cancel).await?,
            );
            self.cache.set(&grpc.address, Arc::clone(&set));
            Ok(set)
        } else {
            Ok(Arc::new(sources::compile_sources(grpc, &self.policy)?))
        }
    }
}
