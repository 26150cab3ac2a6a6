//! TTL-scoped cache of reflected descriptor sets.
//!
//! Reflection walks a live server, so the result is cached per endpoint
//! address for a bounded time. TTLs are measured from insertion; reads do
//! not extend them. A background sweeper evicts expired entries so the map
//! does not grow with dead upstreams. The cache starts with the owning
//! upstream and stops at its teardown; once stopped, reads return nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mcp_bridge_core::descriptor::FileDescriptorSet;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    set: Arc<FileDescriptorSet>,
    inserted: Instant,
}

/// Thread-safe `endpoint address → descriptor set` cache with per-entry TTL.
pub struct DescriptorCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Duration,
    stopped: Arc<AtomicBool>,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl DescriptorCache {
    /// A cache with the given TTL. Must be created inside a tokio runtime;
    /// the background sweeper starts immediately.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let entries: Arc<Mutex<HashMap<String, CacheEntry>>> = Arc::default();
        let stopped = Arc::new(AtomicBool::new(false));

        let sweep_entries = Arc::clone(&entries);
        let sweep_stopped = Arc::clone(&stopped);
        let period = (ttl / 2).max(Duration::from_millis(50));
        let sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if sweep_stopped.load(Ordering::SeqCst) {
                    break;
                }
                sweep_entries
                    .lock()
                    .expect("descriptor cache lock poisoned")
                    .retain(|_, entry| entry.inserted.elapsed() <= ttl);
            }
        });

        Self {
            entries,
            ttl,
            stopped,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// A cache with the default five-minute TTL.
    #[must_use]
    pub fn with_default_ttl() -> Self {
        Self::new(DEFAULT_TTL)
    }

    /// Fetch a descriptor set if present and not expired. Does not extend
    /// the entry's TTL.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<Arc<FileDescriptorSet>> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        let entries = self.entries.lock().expect("descriptor cache lock poisoned");
        let entry = entries.get(address)?;
        if entry.inserted.elapsed() > self.ttl {
            return None;
        }
        Some(Arc::clone(&entry.set))
    }

    /// Store a descriptor set under an endpoint address with the default
    /// TTL, replacing any previous entry.
    pub fn set(&self, address: &str, set: Arc<FileDescriptorSet>) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        self.entries
            .lock()
            .expect("descriptor cache lock poisoned")
            .insert(
                address.to_string(),
                CacheEntry {
                    set,
                    inserted: Instant::now(),
                },
            );
    }

    /// Halt the sweeper and clear the cache. Idempotent; after stopping,
    /// `get` never returns a value.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self
            .sweeper
            .lock()
            .expect("descriptor cache lock poisoned")
            .take()
        {
            handle.abort();
        }
        self.entries
            .lock()
            .expect("descriptor cache lock poisoned")
            .clear();
    }
}

impl Drop for DescriptorCache {
    fn drop(&mut self) {
        self.stop();
    }
}
