//! Cache key layout.
//!
//! Keys are shared with other consumers of the fast store, so their format is
//! part of the external interface.

use crate::models::SummaryWindow;

/// Primary key for the location stats sequence.
pub const LOCATION_STATS: &str = "location_stats";

/// Global total visitors of the most recently computed summary.
pub const TOTAL_VISITORS: &str = "analytics:total_visitors";

/// Global location count.
pub const LOCATIONS_COUNT: &str = "analytics:locations_count";

/// Global active sensor count.
pub const ACTIVE_SENSORS: &str = "analytics:active_sensors";

/// Key for a visitor summary window.
///
/// An absent location filter is rendered as `all`, which can never collide
/// with a numeric location id.
pub fn visitor_summary(window: &SummaryWindow) -> String {
    match window.location_id() {
        Some(id) => format!("visitor_summary:{}:{}", window.days(), id),
        None => format!("visitor_summary:{}:all", window.days()),
    }
}

/// Key for a single location's stat.
pub fn location_stat(id: i64) -> String {
    format!("stat:{}", id)
}
