//! Bounded, expiring read-through cache.
//!
//! Wraps a `moka` future cache with a fixed time-to-live measured from
//! insertion, least-recently-used eviction and coalesced loading: concurrent
//! misses on one key run a single loader and share its outcome. Failures
//! and absent values are never cached.

use std::borrow::Borrow;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dscheduler_config::CacheConfig;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;

/// Why a coalesced load produced no value.
#[derive(Debug)]
enum LoadMiss {
    Absent,
    Failed(StoreError),
}

/// Point-in-time counters of one cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub name: String,
    pub entries: u64,
    pub max_entries: u64,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    /// Loader executions. Coalesced misses count once.
    pub loads: u64,
}

/// Keyed cache over values loaded from the job store.
///
/// Keys are compared structurally, never through a flattened string form.
pub struct EntryCache<K, V> {
    name: String,
    inner: Cache<K, V>,
    max_entries: u64,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
}

impl<K, V> EntryCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, max_entries: u64, ttl: Duration) -> Self {
        let name = name.into();
        let inner = Cache::builder()
            .name(&name)
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            name,
            inner,
            max_entries,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &CacheConfig) -> Self {
        Self::new(name, config.max_entries, Duration::from_secs(config.ttl_secs))
    }

    /// Cached value, without loading.
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key).await
    }

    /// Return the cached value or run `loader` once for all concurrent
    /// callers of the same key.
    ///
    /// `Ok(None)` from the loader is returned as-is and not cached.
    pub async fn get_or_load<Q, F>(&self, key: &Q, loader: F) -> Result<Option<V>, StoreError>
    where
        K: Borrow<Q>,
        Q: ToOwned<Owned = K> + Hash + Eq + fmt::Debug + ?Sized,
        F: Future<Output = Result<Option<V>, StoreError>>,
    {
        if let Some(value) = self.inner.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(value));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let init = async {
            self.loads.fetch_add(1, Ordering::Relaxed);
            match loader.await {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(LoadMiss::Absent),
                Err(err) => Err(LoadMiss::Failed(err)),
            }
        };

        match self.inner.try_get_with(key.to_owned(), init).await {
            Ok(value) => Ok(Some(value)),
            Err(miss) => match miss.as_ref() {
                LoadMiss::Absent => Ok(None),
                LoadMiss::Failed(err) => {
                    debug!(cache = %self.name, key = ?key, error = %err, "Load failed");
                    Err(err.clone())
                }
            },
        }
    }

    /// Drop the entry, then load it afresh.
    pub async fn refresh<Q, F>(&self, key: &Q, loader: F) -> Result<Option<V>, StoreError>
    where
        K: Borrow<Q>,
        Q: ToOwned<Owned = K> + Hash + Eq + fmt::Debug + ?Sized,
        F: Future<Output = Result<Option<V>, StoreError>>,
    {
        self.invalidate(key).await;
        self.get_or_load(key, loader).await
    }

    pub async fn put(&self, key: impl Into<K>, value: V) {
        self.inner.insert(key.into(), value).await;
    }

    pub async fn invalidate<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate; call [`run_pending_tasks`](Self::run_pending_tasks)
    /// first for an exact figure.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Apply pending evictions and invalidations.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name.clone(),
            entries: self.inner.entry_count(),
            max_entries: self.max_entries,
            ttl_secs: self.ttl.as_secs(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
