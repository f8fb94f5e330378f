//! In-process [`CacheStore`] with per-entry TTL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use domus_core::{CacheStore, DomusError};
use moka::Expiry;
use moka::future::Cache;

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache store with per-entry TTL.
///
/// Suitable for a single hydrator process; use `RedisCacheStore` when several
/// processes must share the resolution cache and its locks.
#[derive(Clone)]
pub struct MemoryCacheStore {
    cache: Cache<String, Entry>,
}

impl MemoryCacheStore {
    /// Default number of entries retained before eviction.
    pub const DEFAULT_CAPACITY: u64 = 100_000;

    /// Create a store holding at most `max_capacity` entries.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity.max(1))
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomusError> {
        Ok(self.cache.get(key).await.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), DomusError> {
        self.cache.insert(key.to_string(), Entry { value, ttl }).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, DomusError> {
        Ok(self.cache.contains_key(key))
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, DomusError> {
        let entry = self
            .cache
            .entry_by_ref(key)
            .or_insert_with(async move { Entry { value, ttl } })
            .await;
        Ok(entry.is_fresh())
    }
}
