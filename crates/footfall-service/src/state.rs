//! Application state shared across handlers.
//!
//! The store sits behind a single async mutex shared with the analytics layer,
//! so record writes and analytics snapshots never interleave on the same
//! connection. Hold the lock only for the duration of one store call.

use std::sync::Arc;
use std::time::Duration;

use footfall_analytics::{Analytics, AnalyticsOptions, KvStore, MemoryCache, TtlCache};
use footfall_store::Store;
use tokio::sync::Mutex;

use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// The record store.
    pub store: Arc<Mutex<Store>>,
    /// Configuration the server was started with.
    pub config: Config,
    /// Cached analytics over `store`.
    pub analytics: Analytics,
}

impl AppState {
    /// Create state with explicit cache backends.
    pub fn new(
        store: Store,
        config: Config,
        cache: Arc<dyn TtlCache>,
        kv: Arc<dyn KvStore>,
    ) -> Arc<Self> {
        let store = Arc::new(Mutex::new(store));
        let analytics = Analytics::new(Arc::clone(&store), cache, kv).with_options(
            AnalyticsOptions {
                ttl: config.cache.ttl(),
                ..Default::default()
            },
        );
        Arc::new(Self {
            store,
            config,
            analytics,
        })
    }

    /// Create state with one in-process cache serving both roles.
    pub fn with_memory_cache(store: Store, config: Config) -> Arc<Self> {
        let cache = Arc::new(MemoryCache::with_capacity(config.cache.max_capacity));
        Self::new(store, config, cache.clone(), cache)
    }

    /// Lifetime of cached analytics entries.
    pub fn cache_ttl(&self) -> Duration {
        self.analytics.options().ttl
    }
}
