//! HTTP REST API for visitor records and cached visitor analytics.
//!
//! # REST API Endpoints
//!
//! - `GET /health` - Service health check
//! - `GET /analytics/summary?days=&location_id=` - Visitor summary (cached)
//! - `GET /analytics/location-stats` - Per-location totals (cached)
//! - `GET /analytics/cache` - Cache hit/miss counters
//! - `GET /metrics` - Prometheus metrics
//! - `GET|POST /locations`, `GET|PUT|DELETE /locations/{id}`
//! - `GET|POST /sensors`, `GET|PUT|DELETE /sensors/{id}`
//! - `GET|POST /visitors`, `GET|PUT|DELETE /visitors/{id}`
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/footfall/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [storage]
//! path = "~/.local/share/footfall/data.db"
//!
//! [cache]
//! backend = "memory"   # or "redis" (requires the `redis` feature)
//! ttl_secs = 3600
//! # redis_url = "redis://127.0.0.1:6379"
//!
//! [metrics]
//! enabled = true
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod records;
pub mod state;

pub use config::{
    CacheBackend, CacheConfig, Config, ConfigError, MetricsConfig, ServerConfig, StorageConfig,
};
pub use error::{AppError, FieldErrors};
pub use state::AppState;
