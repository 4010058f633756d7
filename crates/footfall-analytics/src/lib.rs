//! Visitor analytics with a cache-aside layer.
//!
//! Two read operations are offered on top of a [`footfall_store::Store`]:
//!
//! - **Visitor summary**: per-day totals over a look-back window, optionally
//!   restricted to one location
//! - **Location stats**: all-time visitor and sensor totals per location
//!
//! [`Analytics`] serves both through a [`TtlCache`]. Misses are computed in a
//! single store snapshot and written back, then fanned out to a [`KvStore`]
//! together with global scalar keys (see [`keys`]). The pure aggregation lives
//! in [`aggregate`] and can be used without any cache.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use footfall_analytics::{Analytics, MemoryCache, SummaryWindow};
//! use footfall_store::Store;
//! use tokio::sync::Mutex;
//!
//! # async fn example() -> footfall_analytics::Result<()> {
//! let store = Arc::new(Mutex::new(Store::open_default()?));
//! let cache = Arc::new(MemoryCache::new());
//! let analytics = Analytics::new(store, cache.clone(), cache);
//!
//! let summary = analytics.visitor_summary(SummaryWindow::new(7, None)?).await?;
//! println!("{} visitors", summary.total_visitors);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `redis`: enables [`RedisCache`](cache::RedisCache)

pub mod aggregate;
mod analytics;
pub mod cache;
mod error;
pub mod keys;
mod metrics;
mod models;

pub use analytics::{Analytics, AnalyticsOptions};
pub use cache::{CacheEntry, CacheError, KvStore, MemoryCache, TtlCache};
pub use error::{Error, Result};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use models::{
    DEFAULT_WINDOW_DAYS, DailySummary, LocationStat, MAX_WINDOW_DAYS, SummaryWindow,
    VisitorSummary,
};
