//! Pure aggregation over a [`RecordSource`].
//!
//! Nothing in here touches a cache. Callers that need a consistent view across
//! the several queries a summary issues should pass a store snapshot.

use std::collections::{BTreeMap, HashSet};

use footfall_store::{Observation, ObservationQuery, RecordSource, SensorStatus};
use time::Date;

use crate::error::Result;
use crate::models::{DailySummary, LocationStat, SummaryWindow, VisitorSummary};

/// Compute the visitor summary for `window`, ending on `today`.
///
/// `locations_count` and `active_sensors_count` are store-wide even when the
/// window carries a location filter.
pub fn compute_visitor_summary<S: RecordSource + ?Sized>(
    source: &S,
    window: &SummaryWindow,
    today: Date,
) -> Result<VisitorSummary> {
    let mut query = ObservationQuery::new().since(window.start_date(today));
    if let Some(location_id) = window.location_id() {
        query = query.location(location_id);
    }

    let observations = source.query_observations(&query)?;
    let locations_count = source.count_locations()?;
    let active_sensors_count = source.count_sensors(Some(SensorStatus::Active))?;

    Ok(summarize(
        &observations,
        locations_count,
        active_sensors_count,
    ))
}

/// Build a summary from already-selected observations.
pub fn summarize(
    observations: &[Observation],
    locations_count: u64,
    active_sensors_count: u64,
) -> VisitorSummary {
    #[derive(Default)]
    struct Day {
        total: u64,
        locations: HashSet<i64>,
        sensors: HashSet<i64>,
    }

    let mut days: BTreeMap<Date, Day> = BTreeMap::new();
    for observation in observations {
        let day = days.entry(observation.date).or_default();
        day.total += observation.count;
        day.locations.insert(observation.location_id);
        day.sensors.insert(observation.sensor_id);
    }

    let daily_stats: Vec<DailySummary> = days
        .into_iter()
        .map(|(date, day)| DailySummary {
            date,
            total_visitors: day.total,
            locations_count: day.locations.len() as u64,
            sensors_count: day.sensors.len() as u64,
        })
        .collect();

    let total_visitors: u64 = daily_stats.iter().map(|d| d.total_visitors).sum();
    let average_visitors_per_day = if daily_stats.is_empty() {
        0.0
    } else {
        round2(total_visitors as f64 / daily_stats.len() as f64)
    };

    VisitorSummary {
        total_visitors,
        average_visitors_per_day,
        locations_count,
        active_sensors_count,
        daily_stats,
    }
}

/// All-time visitor and sensor totals per location, in id order.
pub fn compute_location_stats<S: RecordSource + ?Sized>(source: &S) -> Result<Vec<LocationStat>> {
    let stats = source
        .list_locations_with_counts()?
        .into_iter()
        .map(|totals| LocationStat {
            id: totals.location.id,
            name: totals.location.name,
            total_visitors: totals.visitor_total,
            sensors_count: totals.sensor_count,
        })
        .collect();
    Ok(stats)
}

/// Round half away from zero to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
