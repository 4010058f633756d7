//! Cache effectiveness counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Primary lookups that failed and were treated as misses.
    pub lookup_failures: u64,
    pub primary_write_failures: u64,
    pub fanout_successes: u64,
    pub fanout_failures: u64,
    /// Aggregations run against the store.
    pub computations: u64,
}

impl CacheMetricsSnapshot {
    /// Fraction of lookups served from the cache, if any lookups happened.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        if total == 0 {
            None
        } else {
            Some(self.hits as f64 / total as f64)
        }
    }
}

/// Thread-safe counters shared by every request.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    lookup_failures: AtomicU64,
    primary_write_failures: AtomicU64,
    fanout_successes: AtomicU64,
    fanout_failures: AtomicU64,
    computations: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_failure(&self) {
        self.lookup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_primary_write_failure(&self) {
        self.primary_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fanout(&self, success: bool) {
        if success {
            self.fanout_successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fanout_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_computation(&self) {
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
            primary_write_failures: self.primary_write_failures.load(Ordering::Relaxed),
            fanout_successes: self.fanout_successes.load(Ordering::Relaxed),
            fanout_failures: self.fanout_failures.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
        }
    }
}
