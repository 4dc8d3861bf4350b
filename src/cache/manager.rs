//! Cache manager.

use super::backend::CacheStore;
use super::call_cache::CallCacheControl;
use super::key::{CALL_CACHE_KEY, RATE_LIMIT_KEY};
use crate::resilience::RateLimitControl;
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub rate_limit_lifetime: Duration,
    pub call_cache_lifetime: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            rate_limit_lifetime: Duration::from_secs(3600),
            call_cache_lifetime: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the call cache snapshot alive at least as long as its longest entry.
    pub fn with_longest_call_ttl(mut self, ttl_secs: u64) -> Self {
        self.call_cache_lifetime = self.call_cache_lifetime.max(Duration::from_secs(ttl_secs));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub loads: u64,
    pub misses: u64,
    pub commits: u64,
    pub errors: u64,
}

struct AtomicStats {
    loads: AtomicU64,
    misses: AtomicU64,
    commits: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn new() -> Self {
        Self {
            loads: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            loads: self.loads.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Persists the control snapshots in a [`CacheStore`] under two well-known keys.
pub struct CacheManager {
    config: CacheConfig,
    store: Arc<dyn CacheStore>,
    stats: AtomicStats,
}

impl CacheManager {
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            config,
            store,
            stats: AtomicStats::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn load_rate_limits(&self) -> Result<RateLimitControl> {
        self.load(RATE_LIMIT_KEY)
    }

    pub fn load_call_cache(&self) -> Result<CallCacheControl> {
        self.load(CALL_CACHE_KEY)
    }

    /// Queue snapshots of the given controls and flush them with a single commit.
    pub fn save(
        &self,
        limits: Option<&RateLimitControl>,
        calls: Option<&CallCacheControl>,
    ) -> Result<bool> {
        if let Some(limits) = limits {
            self.defer(RATE_LIMIT_KEY, limits, self.config.rate_limit_lifetime)?;
        }
        if let Some(calls) = calls {
            self.defer(CALL_CACHE_KEY, calls, self.config.call_cache_lifetime)?;
        }
        match self.store.commit() {
            Ok(committed) => {
                self.stats.commits.fetch_add(1, Ordering::Relaxed);
                Ok(committed)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub fn clear(&self) -> Result<bool> {
        self.store.clear()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(T::default());
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.stats.loads.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key, error = %e, "discarding unreadable cache snapshot");
                Ok(T::default())
            }
        }
    }

    fn defer<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.save_deferred(key, &raw, ttl)
    }
}
