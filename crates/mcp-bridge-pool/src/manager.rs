//! Registry of live pools, keyed by service ID.
//!
//! At most one pool exists per service ID at any instant; registration of a
//! replacement closes the previous pool. Deregistration closes the pool and
//! stops its health checker.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::pool::GrpcPool;

/// Process-wide registry of upstream connection pools.
#[derive(Default)]
pub struct PoolManager {
    pools: RwLock<HashMap<String, Arc<GrpcPool>>>,
}

impl PoolManager {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool under a service ID, closing any pool it replaces.
    pub fn register(&self, service_id: &str, pool: Arc<GrpcPool>) {
        let previous = self
            .pools
            .write()
            .expect("pool registry lock poisoned")
            .insert(service_id.to_string(), pool);
        if let Some(previous) = previous {
            tracing::warn!(service_id, "replacing an existing pool registration");
            previous.close();
        }
    }

    /// Remove and close the pool registered under a service ID.
    ///
    /// Returns `false` when no pool was registered. Safe to call twice.
    pub fn deregister(&self, service_id: &str) -> bool {
        let removed = self
            .pools
            .write()
            .expect("pool registry lock poisoned")
            .remove(service_id);
        match removed {
            Some(pool) => {
                pool.close();
                true
            }
            None => false,
        }
    }

    /// Fetch the pool registered under a service ID.
    #[must_use]
    pub fn get(&self, service_id: &str) -> Option<Arc<GrpcPool>> {
        self.pools
            .read()
            .expect("pool registry lock poisoned")
            .get(service_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use mcp_bridge_core::config::{GrpcServiceConfig, UpstreamServiceConfig};

    use crate::health::HealthChecker;
    use crate::pool::GrpcPoolOptions;

    use super::*;

    fn pool() -> Arc<GrpcPool> {
        let config = UpstreamServiceConfig {
            name: "svc".to_string(),
            grpc_service: Some(GrpcServiceConfig {
                address: "127.0.0.1:50051".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        Arc::new(
            GrpcPool::new(
                &config,
                GrpcPoolOptions {
                    max_size: 1,
                    ..Default::default()
                },
                Arc::new(HealthChecker::new("")),
            )
            .unwrap(),
        )
    }

    #[test]
    fn register_and_get() {
        let manager = PoolManager::new();
        manager.register("svc", pool());
        assert!(manager.get("svc").is_some());
        assert!(manager.get("other").is_none());
    }

    #[test]
    fn deregister_closes_and_is_idempotent() {
        let manager = PoolManager::new();
        let p = pool();
        manager.register("svc", Arc::clone(&p));

        assert!(manager.deregister("svc"));
        assert!(p.health_checker().is_stopped());
        assert!(!manager.deregister("svc"));
    }

    #[test]
    fn replacement_closes_previous_pool() {
        let manager = PoolManager::new();
        let first = pool();
        manager.register("svc", Arc::clone(&first));
        manager.register("svc", pool());
        assert!(first.health_checker().is_stopped());
    }
}
