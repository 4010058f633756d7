//! Derived analytics records and request parameters.

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::error::{Error, Result};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Default look-back window for visitor summaries.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Largest accepted look-back window (a century).
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Validated parameters for a visitor summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SummaryWindow {
    days: u32,
    location_id: Option<i64>,
}

impl SummaryWindow {
    /// Validate a window length and optional location filter.
    pub fn new(days: i64, location_id: Option<i64>) -> Result<Self> {
        if days < 0 {
            return Err(Error::invalid("days", "must not be negative"));
        }
        if days > MAX_WINDOW_DAYS as i64 {
            return Err(Error::invalid(
                "days",
                format!("must be at most {}", MAX_WINDOW_DAYS),
            ));
        }
        if let Some(id) = location_id
            && id <= 0
        {
            return Err(Error::invalid("location_id", "must be a positive integer"));
        }
        Ok(Self {
            days: days as u32,
            location_id,
        })
    }

    /// Parse raw query-string values.
    ///
    /// A missing `days` falls back to [`DEFAULT_WINDOW_DAYS`]; a missing or
    /// empty `location_id` means no filter.
    pub fn from_query(days: Option<&str>, location_id: Option<&str>) -> Result<Self> {
        let days = match days.map(str::trim) {
            None | Some("") => DEFAULT_WINDOW_DAYS as i64,
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| Error::invalid("days", format!("'{}' is not an integer", raw)))?,
        };
        let location_id = match location_id.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                Error::invalid("location_id", format!("'{}' is not an integer", raw))
            })?),
        };
        Self::new(days, location_id)
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn location_id(&self) -> Option<i64> {
        self.location_id
    }

    /// First date included in the window ending on `today`.
    pub fn start_date(&self, today: Date) -> Date {
        today
            .checked_sub(Duration::days(self.days as i64))
            .unwrap_or(Date::MIN)
    }
}

impl Default for SummaryWindow {
    fn default() -> Self {
        Self {
            days: DEFAULT_WINDOW_DAYS,
            location_id: None,
        }
    }
}

/// Visitor totals for a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub total_visitors: u64,
    /// Distinct locations that reported on this day.
    pub locations_count: u64,
    /// Distinct sensors that reported on this day.
    pub sensors_count: u64,
}

/// Aggregated visitor figures over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorSummary {
    pub total_visitors: u64,
    pub average_visitors_per_day: f64,
    /// All locations in the store, regardless of any location filter.
    pub locations_count: u64,
    /// All active sensors in the store, regardless of any location filter.
    pub active_sensors_count: u64,
    /// One entry per reporting day, ascending.
    pub daily_stats: Vec<DailySummary>,
}

/// All-time totals for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationStat {
    pub id: i64,
    pub name: String,
    pub total_visitors: u64,
    pub sensors_count: u64,
}
