//! Bounded, lazy pool of upstream gRPC clients.
//!
//! A pool owns every client it hands out; callers borrow through
//! [`GrpcPool::get`] and return through [`GrpcPool::put`]. Channels are
//! constructed lazily, so pool construction succeeds even when the upstream
//! is unreachable — the first RPC surfaces the connection error. One
//! [`HealthChecker`] is shared by all clients of a pool and stopped exactly
//! once when the pool closes.
//!
//! mTLS material is validated and loaded at every factory invocation, so
//! rotated certificates take effect on the next client construction.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hyper_util::rt::TokioIo;
use mcp_bridge_core::config::{UpstreamAuthConfig, UpstreamServiceConfig};
use mcp_bridge_core::PathPolicy;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tower::service_fn;

use crate::auth::BearerAuth;
use crate::dialer::{normalize_address, SafeDialer};
use crate::error::{Error, Result};
use crate::health::HealthChecker;
use crate::tls;

/// Construction options for a [`GrpcPool`].
#[derive(Clone, Default)]
pub struct GrpcPoolOptions {
    /// Clients constructed eagerly at pool creation.
    pub min_size: usize,
    /// Upper bound on simultaneously existing clients.
    pub max_size: usize,
    /// Idle clients older than this are discarded on borrow; zero disables.
    pub idle_timeout: Duration,
    /// Connection opener; direct TCP when absent.
    pub dialer: Option<SafeDialer>,
    /// Per-RPC credentials cloned into every client.
    pub credentials: Option<BearerAuth>,
    /// Skip upstream health probing.
    pub disable_health_check: bool,
    /// Path policy for mTLS material; defaults to the process working
    /// directory.
    pub path_policy: Option<PathPolicy>,
}

/// One upstream client: a channel plus the pool's shared health checker.
#[derive(Clone)]
#[derive(Debug)]
pub struct GrpcClient {
    channel: Channel,
    auth: Option<BearerAuth>,
    health: Arc<HealthChecker>,
    health_enabled: bool,
}

impl GrpcClient {
    /// The underlying channel. Channels are cheap to clone.
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Per-RPC credentials, when configured.
    #[must_use]
    pub fn credentials(&self) -> Option<&BearerAuth> {
        self.auth.as_ref()
    }

    /// Probe upstream health through this client's channel.
    ///
    /// # Errors
    ///
    /// See [`HealthChecker::check`]. Succeeds immediately when health
    /// checking is disabled for the pool.
    pub async fn check_health(&self) -> Result<()> {
        if !self.health_enabled {
            return Ok(());
        }
        self.health.check(self.channel.clone()).await
    }
}

struct IdleClient {
    client: GrpcClient,
    since: Instant,
}

/// A borrowed client; return it with [`GrpcPool::put`].
#[derive(Debug)]
pub struct PooledClient {
    client: GrpcClient,
    // Held for the borrow's lifetime; dropping releases pool capacity.
    _permit: OwnedSemaphorePermit,
}

impl std::ops::Deref for PooledClient {
    type Target = GrpcClient;

    fn deref(&self) -> &GrpcClient {
        &self.client
    }
}

type ClientFactory = Box<dyn Fn() -> Result<GrpcClient> + Send + Sync>;

/// Bounded pool of gRPC clients for one upstream service.
pub struct GrpcPool {
    endpoint: String,
    free: Mutex<VecDeque<IdleClient>>,
    semaphore: Arc<Semaphore>,
    factory: ClientFactory,
    health: Arc<HealthChecker>,
    closed: AtomicBool,
    size: AtomicUsize,
    idle_timeout: Duration,
}

impl std::fmt::Debug for GrpcPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcPool")
            .field("endpoint", &self.endpoint)
            .field("health", &self.health)
            .field("closed", &self.closed)
            .field("size", &self.size)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl GrpcPool {
    /// Build a pool for the gRPC upstream described by `config`.
    ///
    /// The health checker is constructed by the caller (keyed to the
    /// service) and owned by the pool from here on: it is stopped when the
    /// pool closes, or immediately if eager initialization fails.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] when the gRPC block is missing, the
    ///   address is empty, or the size bounds are unusable;
    /// - [`Error::PoolInit`] when `min_size > 0` and a client cannot be
    ///   constructed (the health checker is stopped before returning).
    pub fn new(
        config: &UpstreamServiceConfig,
        options: GrpcPoolOptions,
        health: Arc<HealthChecker>,
    ) -> Result<Self> {
        let Some(grpc) = &config.grpc_service else {
            return Err(Error::InvalidConfig(format!(
                "service '{}' has no grpc_service block",
                config.name
            )));
        };
        if grpc.address.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "service '{}' has an empty upstream address",
                config.name
            )));
        }
        if options.max_size == 0 {
            return Err(Error::InvalidConfig("max_size must be at least 1".to_string()));
        }
        if options.min_size > options.max_size {
            return Err(Error::InvalidConfig(format!(
                "min_size {} exceeds max_size {}",
                options.min_size, options.max_size
            )));
        }

        let endpoint = normalize_address(&grpc.address).to_string();
        let factory = Self::factory(
            endpoint.clone(),
            config.upstream_auth.clone(),
            &options,
            Arc::clone(&health),
        );

        let pool = Self {
            endpoint,
            free: Mutex::new(VecDeque::new()),
            semaphore: Arc::new(Semaphore::new(options.max_size)),
            factory,
            health,
            closed: AtomicBool::new(false),
            size: AtomicUsize::new(0),
            idle_timeout: options.idle_timeout,
        };

        for _ in 0..options.min_size {
            match (pool.factory)() {
                Ok(client) => {
                    pool.size.fetch_add(1, Ordering::SeqCst);
                    pool.free
                        .lock()
                        .expect("pool free list lock poisoned")
                        .push_back(IdleClient {
                            client,
                            since: Instant::now(),
                        });
                }
                Err(err) => {
                    pool.health.stop();
                    return Err(Error::PoolInit(Box::new(err)));
                }
            }
        }

        Ok(pool)
    }

    fn factory(
        endpoint: String,
        auth_config: Option<UpstreamAuthConfig>,
        options: &GrpcPoolOptions,
        health: Arc<HealthChecker>,
    ) -> ClientFactory {
        let dialer = options.dialer.clone();
        let credentials = options.credentials.clone();
        let path_policy = options.path_policy.clone();
        let health_enabled = !options.disable_health_check;

        Box::new(move || {
            let mtls = match &auth_config {
                Some(UpstreamAuthConfig::Mtls {
                    client_cert_path,
                    client_key_path,
                    ca_cert_path,
                }) => {
                    let policy = match &path_policy {
                        Some(policy) => policy.clone(),
                        None => PathPolicy::current_dir()?,
                    };
                    Some(tls::mtls_config(
                        &policy,
                        client_cert_path,
                        client_key_path,
                        ca_cert_path,
                    )?)
                }
                _ => None,
            };

            let scheme = if mtls.is_some() { "https" } else { "http" };
            let mut builder = Endpoint::from_shared(format!("{scheme}://{endpoint}"))?;
            if let Some(tls_config) = mtls {
                builder = builder.tls_config(tls_config)?;
            }

            let channel = match &dialer {
                Some(dialer) => {
                    let dial = Arc::clone(dialer);
                    builder.connect_with_connector_lazy(service_fn(move |uri| {
                        let dial = Arc::clone(&dial);
                        async move { dial(uri).await.map(TokioIo::new) }
                    }))
                }
                None => builder.connect_lazy(),
            };

            Ok(GrpcClient {
                channel,
                auth: credentials.clone(),
                health: Arc::clone(&health),
                health_enabled,
            })
        })
    }

    /// The normalized upstream address this pool dials.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The pool's shared health checker.
    #[must_use]
    pub fn health_checker(&self) -> &Arc<HealthChecker> {
        &self.health
    }

    /// Borrow a client, waiting for capacity if the pool is fully
    /// borrowed.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolClosed`] once the pool has been closed;
    /// - [`Error::ContextCancelled`] when the caller's token fires while
    ///   waiting;
    /// - factory errors when a new client must be constructed.
    pub async fn get(&self, cancel: &CancellationToken) -> Result<PooledClient> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::PoolClosed);
        }

        let permit = tokio::select! {
            () = cancel.cancelled() => return Err(Error::ContextCancelled),
            acquired = Arc::clone(&self.semaphore).acquire_owned() => {
                acquired.map_err(|_| Error::PoolClosed)?
            }
        };

        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::PoolClosed);
        }

        // Discard idle clients that outlived the idle timeout.
        let reused = {
            let mut free = self.free.lock().expect("pool free list lock poisoned");
            loop {
                match free.pop_front() {
                    Some(idle)
                        if !self.idle_timeout.is_zero()
                            && idle.since.elapsed() > self.idle_timeout =>
                    {
                        self.size.fetch_sub(1, Ordering::SeqCst);
                    }
                    Some(idle) => break Some(idle.client),
                    None => break None,
                }
            }
        };

        let client = match reused {
            Some(client) => client,
            None => {
                let client = (self.factory)()?;
                self.size.fetch_add(1, Ordering::SeqCst);
                client
            }
        };

        Ok(PooledClient {
            client,
            _permit: permit,
        })
    }

    /// Return a borrowed client to the free list.
    ///
    /// Returning to a closed pool drops the client instead.
    pub fn put(&self, borrowed: PooledClient) {
        if self.closed.load(Ordering::SeqCst) {
            self.size.fetch_sub(1, Ordering::SeqCst);
            return;
        }
        self.free
            .lock()
            .expect("pool free list lock poisoned")
            .push_back(IdleClient {
                client: borrowed.client,
                since: Instant::now(),
            });
    }

    /// Number of clients currently owned by the pool (borrowed or idle).
    #[must_use]
    pub fn len(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Whether the pool currently owns no clients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the pool: drop every returned client and stop the shared
    /// health checker. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.semaphore.close();
        let drained = {
            let mut free = self.free.lock().expect("pool free list lock poisoned");
            let drained = free.len();
            free.clear();
            drained
        };
        self.size.fetch_sub(drained, Ordering::SeqCst);
        self.health.stop();
        tracing::debug!(endpoint = %self.endpoint, "connection pool closed");
    }
}

impl Drop for GrpcPool {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use mcp_bridge_core::config::GrpcServiceConfig;

    use super::*;

    fn grpc_config(address: &str) -> UpstreamServiceConfig {
        UpstreamServiceConfig {
            name: "weather-service".to_string(),
            grpc_service: Some(GrpcServiceConfig {
                address: address.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn options(min: usize, max: usize) -> GrpcPoolOptions {
        GrpcPoolOptions {
            min_size: min,
            max_size: max,
            ..Default::default()
        }
    }

    fn checker() -> Arc<HealthChecker> {
        Arc::new(HealthChecker::new(""))
    }

    #[test]
    fn missing_grpc_block_is_invalid() {
        let config = UpstreamServiceConfig {
            name: "svc".to_string(),
            ..Default::default()
        };
        let err = GrpcPool::new(&config, options(0, 1), checker()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "got: {err}");
    }

    #[test]
    fn empty_address_is_invalid() {
        let err = GrpcPool::new(&grpc_config(""), options(0, 1), checker()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "got: {err}");
    }

    #[test]
    fn grpc_prefix_is_stripped() {
        let pool =
            GrpcPool::new(&grpc_config("grpc://127.0.0.1:50051"), options(0, 1), checker())
                .unwrap();
        assert_eq!(pool.endpoint(), "127.0.0.1:50051");
    }

    #[tokio::test]
    async fn get_put_round_trip_stays_within_bounds() {
        let pool =
            GrpcPool::new(&grpc_config("127.0.0.1:50051"), options(0, 2), checker()).unwrap();
        let cancel = CancellationToken::new();

        let a = pool.get(&cancel).await.unwrap();
        let b = pool.get(&cancel).await.unwrap();
        assert_eq!(pool.len(), 2);

        pool.put(a);
        pool.put(b);
        assert_eq!(pool.len(), 2, "returned clients stay pooled");

        let _again = pool.get(&cancel).await.unwrap();
        assert_eq!(pool.len(), 2, "idle client is reused, not rebuilt");
    }

    #[tokio::test]
    async fn eager_min_size_constructs_clients() {
        let pool =
            GrpcPool::new(&grpc_config("127.0.0.1:50051"), options(2, 4), checker()).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_get_reports_context_cancelled() {
        let pool = Arc::new(
            GrpcPool::new(&grpc_config("127.0.0.1:50051"), options(0, 1), checker()).unwrap(),
        );
        let cancel = CancellationToken::new();

        // Exhaust capacity, then race a second borrow against cancellation.
        let held = pool.get(&cancel).await.unwrap();
        let waiting = {
            let pool = Arc::clone(&pool);
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.get(&cancel).await })
        };

        tokio::task::yield_now().await;
        cancel.cancel();
        let err = waiting.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ContextCancelled), "got: {err}");
        pool.put(held);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fails_future_gets() {
        let pool =
            GrpcPool::new(&grpc_config("127.0.0.1:50051"), options(1, 2), checker()).unwrap();
        pool.close();
        pool.close();

        let err = pool.get(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::PoolClosed), "got: {err}");
        assert!(pool.health_checker().is_stopped());
        assert!(pool.is_empty());
    }

    #[test]
    fn invalid_mtls_paths_fail_eager_init_and_stop_checker() {
        let mut config = grpc_config("127.0.0.1:50051");
        config.upstream_auth = Some(UpstreamAuthConfig::Mtls {
            client_cert_path: "/etc/ssl/client.pem".to_string(),
            client_key_path: "/etc/ssl/client.key".to_string(),
            ca_cert_path: "/etc/ssl/ca.pem".to_string(),
        });

        let health = checker();
        let err = GrpcPool::new(&config, options(1, 2), Arc::clone(&health)).unwrap_err();
        assert!(matches!(err, Error::PoolInit(_)), "got: {err}");
        assert!(health.is_stopped(), "checker must not leak unstopped");
    }
}
