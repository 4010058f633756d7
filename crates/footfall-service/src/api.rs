//! REST API endpoints for footfall-service.
//!
//! Analytics endpoints read through the cache-aside layer; record endpoints
//! (see [`crate::records`]) write straight to the store and never touch the
//! cache, so analytics may be up to one TTL stale.
//!
//! All endpoints return structured JSON errors via [`AppError`].
//!
//! # Example
//!
//! ```ignore
//! use footfall_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    routing::get,
};
use footfall_analytics::{CacheMetricsSnapshot, LocationStat, SummaryWindow, VisitorSummary};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AppError;
use crate::records;
use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .route("/analytics/summary", get(visitor_summary))
        .route("/analytics/location-stats", get(location_stats))
        .route("/analytics/cache", get(cache_metrics))
        .merge(records::router())
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Raw query parameters for the visitor summary.
///
/// Kept as strings so malformed values produce a JSON error instead of the
/// extractor's plain-text rejection.
#[derive(Debug, Deserialize, Default)]
pub struct SummaryQuery {
    pub days: Option<String>,
    pub location_id: Option<String>,
}

/// Visitor summary over the last `days` days (default 7).
///
/// # Query Parameters
///
/// - `days`: non-negative window length
/// - `location_id`: restrict per-day figures to one location
///
/// # Errors
///
/// - [`AppError::BadRequest`] for negative or non-numeric parameters, before
///   the cache is consulted
async fn visitor_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryQuery>,
) -> Result<Json<VisitorSummary>, AppError> {
    let window =
        SummaryWindow::from_query(params.days.as_deref(), params.location_id.as_deref())?;
    let summary = state.analytics.visitor_summary(window).await?;
    Ok(Json(summary))
}

/// All-time visitor and sensor totals per location.
async fn location_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LocationStat>>, AppError> {
    let stats = state.analytics.location_stats().await?;
    Ok(Json(stats))
}

/// Cache effectiveness counters as JSON.
async fn cache_metrics(State(state): State<Arc<AppState>>) -> Json<CacheMetricsSnapshot> {
    Json(state.analytics.metrics())
}

/// Prometheus-compatible metrics endpoint.
///
/// Exposes the analytics cache counters in text exposition format:
/// - `footfall_cache_hits_total`, `footfall_cache_misses_total`
/// - `footfall_cache_lookup_failures_total`
/// - `footfall_cache_primary_write_failures_total`
/// - `footfall_cache_fanout_total{result="success|failure"}`
/// - `footfall_analytics_computations_total`
/// - `footfall_cache_hit_ratio` (only once a lookup happened)
async fn prometheus_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, [(header::HeaderName, &'static str); 1], String), AppError> {
    if !state.config.metrics.enabled {
        return Err(AppError::NotFound(
            "Prometheus metrics endpoint is disabled".to_string(),
        ));
    }

    let output = render_prometheus(&state.analytics.metrics());
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    ))
}

fn render_prometheus(metrics: &CacheMetricsSnapshot) -> String {
    let mut output = String::with_capacity(1024);

    let counters = [
        (
            "footfall_cache_hits_total",
            "Analytics reads served from the cache",
            metrics.hits,
        ),
        (
            "footfall_cache_misses_total",
            "Analytics reads that had to be computed",
            metrics.misses,
        ),
        (
            "footfall_cache_lookup_failures_total",
            "Cache lookups that failed and were treated as misses",
            metrics.lookup_failures,
        ),
        (
            "footfall_cache_primary_write_failures_total",
            "Failed writes of computed results to the cache",
            metrics.primary_write_failures,
        ),
        (
            "footfall_analytics_computations_total",
            "Aggregations run against the record store",
            metrics.computations,
        ),
    ];
    for (name, help, value) in counters {
        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} counter", name);
        let _ = writeln!(output, "{} {}\n", name, value);
    }

    output.push_str("# HELP footfall_cache_fanout_total Fan-out batches by outcome\n");
    output.push_str("# TYPE footfall_cache_fanout_total counter\n");
    let _ = writeln!(
        output,
        "footfall_cache_fanout_total{{result=\"success\"}} {}",
        metrics.fanout_successes
    );
    let _ = writeln!(
        output,
        "footfall_cache_fanout_total{{result=\"failure\"}} {}\n",
        metrics.fanout_failures
    );

    if let Some(ratio) = metrics.hit_ratio() {
        output.push_str("# HELP footfall_cache_hit_ratio Fraction of reads served from the cache\n");
        output.push_str("# TYPE footfall_cache_hit_ratio gauge\n");
        let _ = writeln!(output, "footfall_cache_hit_ratio {:.4}", ratio);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use footfall_store::{NewLocation, NewObservation, NewSensor, SensorStatus, Store};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;

    fn create_test_state() -> Arc<AppState> {
        AppState::with_memory_cache(Store::open_in_memory().unwrap(), Config::default())
    }

    async fn response_body(response: axum::response::Response) -> String {
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn fetch(state: &Arc<AppState>, uri: &str) -> (StatusCode, String) {
        let response = router()
            .with_state(Arc::clone(state))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, response_body(response).await)
    }

    async fn seed_one(state: &Arc<AppState>, count: u64) -> i64 {
        let store = state.store.lock().await;
        let location = store.insert_location(&NewLocation::named("Lobby")).unwrap();
        let sensor = store
            .insert_sensor(&NewSensor {
                name: "Door Entry Sensor 1".to_string(),
                status: SensorStatus::Active,
                location_id: location.id,
            })
            .unwrap();
        store
            .insert_observation(&NewObservation {
                location_id: location.id,
                sensor_id: sensor.id,
                date: OffsetDateTime::now_utc().date(),
                count,
            })
            .unwrap();
        location.id
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = create_test_state();
        let (status, body) = fetch(&state, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_summary_empty_store() {
        let state = create_test_state();
        let (status, body) = fetch(&state, "/analytics/summary").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["total_visitors"], 0);
        assert_eq!(json["average_visitors_per_day"].as_f64(), Some(0.0));
        assert_eq!(json["locations_count"], 0);
        assert_eq!(json["active_sensors_count"], 0);
        assert!(json["daily_stats"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_single_observation() {
        let state = create_test_state();
        seed_one(&state, 10).await;

        let (status, body) = fetch(&state, "/analytics/summary?days=7").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["total_visitors"], 10);
        assert_eq!(json["average_visitors_per_day"].as_f64(), Some(10.0));
        assert_eq!(json["locations_count"], 1);
        assert_eq!(json["active_sensors_count"], 1);

        let daily = json["daily_stats"].as_array().unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0]["total_visitors"], 10);
        assert_eq!(daily[0]["locations_count"], 1);
        assert_eq!(daily[0]["sensors_count"], 1);
        assert_eq!(
            daily[0]["date"],
            OffsetDateTime::now_utc().date().to_string()
        );
    }

    #[tokio::test]
    async fn test_summary_repeat_is_byte_identical() {
        let state = create_test_state();
        seed_one(&state, 10).await;

        let (_, first) = fetch(&state, "/analytics/summary?days=7").await;
        seed_one(&state, 20).await;
        let (_, second) = fetch(&state, "/analytics/summary?days=7").await;

        assert_eq!(first, second);
        assert_eq!(state.analytics.metrics().hits, 1);
    }

    #[tokio::test]
    async fn test_summary_with_location_filter() {
        let state = create_test_state();
        let lobby = seed_one(&state, 10).await;
        seed_one(&state, 5).await;

        let (status, body) =
            fetch(&state, &format!("/analytics/summary?days=7&location_id={}", lobby)).await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["total_visitors"], 10);
        assert_eq!(json["locations_count"], 2);
        assert_eq!(json["active_sensors_count"], 2);
    }

    #[tokio::test]
    async fn test_summary_rejects_bad_parameters() {
        let state = create_test_state();
        for uri in [
            "/analytics/summary?days=-1",
            "/analytics/summary?days=week",
            "/analytics/summary?location_id=abc",
            "/analytics/summary?location_id=0",
        ] {
            let (status, body) = fetch(&state, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            let json: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert!(json["error"].is_string());
        }

        let metrics = state.analytics.metrics();
        assert_eq!(metrics.hits + metrics.misses, 0);
    }

    #[tokio::test]
    async fn test_location_stats_endpoint() {
        let state = create_test_state();
        let lobby = seed_one(&state, 12).await;
        let annex = state
            .store
            .lock()
            .await
            .insert_location(&NewLocation::named("Annex"))
            .unwrap();

        let (status, body) = fetch(&state, "/analytics/location-stats").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let stats = json.as_array().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0]["id"], lobby);
        assert_eq!(stats[0]["name"], "Lobby");
        assert_eq!(stats[0]["total_visitors"], 12);
        assert_eq!(stats[0]["sensors_count"], 1);
        assert_eq!(stats[1]["id"], annex.id);
        assert_eq!(stats[1]["total_visitors"], 0);
        assert_eq!(stats[1]["sensors_count"], 0);
    }

    #[tokio::test]
    async fn test_cache_metrics_endpoint() {
        let state = create_test_state();
        fetch(&state, "/analytics/location-stats").await;
        fetch(&state, "/analytics/location-stats").await;

        let (status, body) = fetch(&state, "/analytics/cache").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["misses"], 1);
        assert_eq!(json["computations"], 1);
    }

    #[tokio::test]
    async fn test_prometheus_endpoint() {
        let state = create_test_state();
        fetch(&state, "/analytics/summary").await;

        let response = router()
            .with_state(Arc::clone(&state))
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );

        let body = response_body(response).await;
        assert!(body.contains("# TYPE footfall_cache_hits_total counter"));
        assert!(body.contains("footfall_cache_misses_total 1"));
        assert!(body.contains("footfall_cache_hit_ratio 0.0000"));
    }

    #[tokio::test]
    async fn test_prometheus_endpoint_disabled() {
        let mut config = Config::default();
        config.metrics.enabled = false;
        let state = AppState::with_memory_cache(Store::open_in_memory().unwrap(), config);

        let (status, body) = fetch(&state, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("disabled"));
    }

    #[test]
    fn test_render_prometheus_without_lookups_omits_ratio() {
        let output = render_prometheus(&CacheMetricsSnapshot::default());
        assert!(output.contains("footfall_cache_fanout_total{result=\"success\"} 0"));
        assert!(!output.contains("footfall_cache_hit_ratio"));
    }
}
