//! Cache backends.
//!
//! The orchestrator talks to two collaborators: a [`TtlCache`] holding the
//! primary result per key, and a [`KvStore`] receiving the fan-out batch of
//! the result plus the global scalar keys. Both may be the same backend.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::{DEFAULT_MAX_CAPACITY, MemoryCache};
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

/// Default time-to-live for every cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Errors reported by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached or rejected the command.
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

/// One key of an atomic batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl,
        }
    }
}

/// A key/value cache with per-entry expiry.
#[async_trait]
pub trait TtlCache: Send + Sync {
    /// Fetch a live entry. Expired entries are reported as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl`, replacing any previous value.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// A fast multi-key store shared with other services.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a single key.
    async fn lookup(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write every entry or none of them.
    async fn atomic_batch(&self, entries: &[CacheEntry]) -> Result<(), CacheError>;
}

/// Whole seconds for backends that only accept second granularity.
///
/// Rounds up and never returns zero, so a sub-second TTL does not become
/// "no expiry" or an error.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}
