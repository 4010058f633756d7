//! Cache-aside orchestration of the aggregations.
//!
//! Every read first consults the primary [`TtlCache`]. On a miss the result is
//! computed inside one store snapshot, written back under the primary key and
//! then fanned out to the [`KvStore`] in a single atomic batch together with
//! the global scalar keys.
//!
//! Both cache writes run in one spawned task, so a request dropped mid-flight
//! (a client disconnect, a timeout) still gets its primary entry and its whole
//! batch written. The
//! orchestrator never deletes or invalidates entries.

use std::sync::Arc;
use std::time::Duration;

use footfall_store::{Snapshot, Store};
use serde::de::DeserializeOwned;
use time::{Date, OffsetDateTime};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

use crate::aggregate;
use crate::cache::{CacheEntry, DEFAULT_TTL, KvStore, TtlCache};
use crate::error::Result;
use crate::keys;
use crate::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::models::{LocationStat, SummaryWindow, VisitorSummary};

/// Tunables for [`Analytics`].
#[derive(Debug, Clone)]
pub struct AnalyticsOptions {
    /// Lifetime of every entry written.
    pub ttl: Duration,
    /// Wait for the fan-out batch before returning instead of detaching it.
    pub await_fanout: bool,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            await_fanout: false,
        }
    }
}

/// Visitor analytics served through a TTL cache.
#[derive(Clone)]
pub struct Analytics {
    store: Arc<Mutex<Store>>,
    cache: Arc<dyn TtlCache>,
    kv: Arc<dyn KvStore>,
    metrics: Arc<CacheMetrics>,
    options: AnalyticsOptions,
}

impl Analytics {
    pub fn new(store: Arc<Mutex<Store>>, cache: Arc<dyn TtlCache>, kv: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            cache,
            kv,
            metrics: Arc::new(CacheMetrics::new()),
            options: AnalyticsOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalyticsOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AnalyticsOptions {
        &self.options
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The date windows end on (UTC).
    pub fn today() -> Date {
        OffsetDateTime::now_utc().date()
    }

    /// Visitor summary for `window`, cached per window.
    pub async fn visitor_summary(&self, window: SummaryWindow) -> Result<VisitorSummary> {
        let key = keys::visitor_summary(&window);
        if let Some(summary) = self.lookup::<VisitorSummary>(&key).await {
            return Ok(summary);
        }

        let today = Self::today();
        let summary = self
            .compute(|snapshot| aggregate::compute_visitor_summary(snapshot, &window, today))
            .await?;
        let json = serde_json::to_string(&summary)?;

        let ttl = self.options.ttl;
        let fanout = vec![
            CacheEntry::new(key.clone(), json.clone(), ttl),
            CacheEntry::new(keys::TOTAL_VISITORS, summary.total_visitors.to_string(), ttl),
            CacheEntry::new(keys::LOCATIONS_COUNT, summary.locations_count.to_string(), ttl),
            CacheEntry::new(
                keys::ACTIVE_SENSORS,
                summary.active_sensors_count.to_string(),
                ttl,
            ),
        ];
        self.persist(key, json, fanout).await;

        Ok(summary)
    }

    /// Per-location totals, cached as one sequence and fanned out per location.
    pub async fn location_stats(&self) -> Result<Vec<LocationStat>> {
        if let Some(stats) = self.lookup::<Vec<LocationStat>>(keys::LOCATION_STATS).await {
            return Ok(stats);
        }

        let stats = self
            .compute(|snapshot| aggregate::compute_location_stats(snapshot))
            .await?;
        let json = serde_json::to_string(&stats)?;

        let ttl = self.options.ttl;
        let mut fanout = Vec::with_capacity(stats.len() + 1);
        fanout.push(CacheEntry::new(keys::LOCATION_STATS, json.clone(), ttl));
        for stat in &stats {
            fanout.push(CacheEntry::new(
                keys::location_stat(stat.id),
                serde_json::to_string(stat)?,
                ttl,
            ));
        }
        self.persist(keys::LOCATION_STATS.to_string(), json, fanout).await;

        Ok(stats)
    }

    /// Primary lookup. Any failure, including an unreadable entry, counts as a
    /// miss.
    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!("Cache hit for {}", key);
                    self.metrics.record_hit();
                    return Some(value);
                }
                Err(e) => {
                    warn!("Ignoring unreadable cache entry {}: {}", key, e);
                    self.metrics.record_lookup_failure();
                }
            },
            Ok(None) => debug!("Cache miss for {}", key),
            Err(e) => {
                warn!("Cache lookup for {} failed, computing fresh: {}", key, e);
                self.metrics.record_lookup_failure();
            }
        }
        self.metrics.record_miss();
        None
    }

    async fn compute<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Snapshot<'_>) -> Result<T>,
    {
        let store = self.store.lock().await;
        let snapshot = store.snapshot()?;
        self.metrics.record_computation();
        f(&snapshot)
    }

    /// Write the primary entry and then the fan-out batch from one spawned
    /// task, so dropping the caller cancels neither.
    ///
    /// Returns once the primary write has settled, or once the whole task has
    /// finished when `await_fanout` is set.
    async fn persist(&self, key: String, value: String, fanout: Vec<CacheEntry>) {
        let cache = Arc::clone(&self.cache);
        let kv = Arc::clone(&self.kv);
        let metrics = Arc::clone(&self.metrics);
        let ttl = self.options.ttl;
        let (primary_tx, primary_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            if let Err(e) = cache.set_with_ttl(&key, &value, ttl).await {
                warn!("Failed to cache {}: {}", key, e);
                metrics.record_primary_write_failure();
            }
            // The caller may already be gone
            let _ = primary_tx.send(());

            match kv.atomic_batch(&fanout).await {
                Ok(()) => {
                    debug!("Fanned out {} cache entries", fanout.len());
                    metrics.record_fanout(true);
                }
                Err(e) => {
                    warn!("Fan-out of {} cache entries failed: {}", fanout.len(), e);
                    metrics.record_fanout(false);
                }
            }
        });

        if self.options.await_fanout {
            if let Err(e) = task.await {
                warn!("Cache write task failed: {}", e);
            }
        } else if primary_rx.await.is_err() {
            warn!("Cache write task ended before the primary write settled");
        }
    }
}

impl std::fmt::Debug for Analytics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analytics")
            .field("options", &self.options)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}
