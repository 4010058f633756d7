//! In-process cache backed by moka.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::sync::Cache;
use tokio::sync::RwLock;

use super::{CacheEntry, CacheError, KvStore, TtlCache};

/// Default upper bound on the number of cached entries.
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct Stored {
    value: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Stored> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Stored,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process [`TtlCache`] and [`KvStore`].
///
/// Batches are applied under a write lock that readers of
/// [`KvStore::lookup`] also take, so a batch is observed entirely or not at
/// all.
pub struct MemoryCache {
    entries: Cache<String, Stored>,
    batch_lock: RwLock<()>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self {
            entries,
            batch_lock: RwLock::new(()),
        }
    }

    /// Drop every entry. Administrative use only; the analytics layer never
    /// invalidates.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

#[async_trait]
impl TtlCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).map(|stored| stored.value))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Stored {
                value: value.to_string(),
                ttl,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryCache {
    async fn lookup(&self, key: &str) -> Result<Option<String>, CacheError> {
        let _guard = self.batch_lock.read().await;
        Ok(self.entries.get(key).map(|stored| stored.value))
    }

    async fn atomic_batch(&self, entries: &[CacheEntry]) -> Result<(), CacheError> {
        let _guard = self.batch_lock.write().await;
        for entry in entries {
            self.entries.insert(
                entry.key.clone(),
                Stored {
                    value: entry.value.clone(),
                    ttl: entry.ttl,
                },
            );
        }
        Ok(())
    }
}
