//! Query builder for observations.
//!
//! [`ObservationQuery`] follows the builder pattern so callers can combine
//! filters without caring about SQL.
//!
//! # Example
//!
//! ```
//! use footfall_store::{ObservationQuery, RecordSource, Store};
//! use time::macros::date;
//!
//! let store = Store::open_in_memory()?;
//!
//! let query = ObservationQuery::new()
//!     .since(date!(2025 - 06 - 01))
//!     .location(3);
//!
//! let observations = store.query_observations(&query)?;
//! assert!(observations.is_empty());
//! # Ok::<(), footfall_store::Error>(())
//! ```

use time::Date;

/// Fluent query builder for observations.
///
/// All filters are optional. Results are ordered by date ascending, then by
/// row id, so repeated queries over the same data return the same sequence.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ObservationQuery {
    /// Only include observations on or after this date.
    pub since: Option<Date>,
    /// Only include observations on or before this date.
    pub until: Option<Date>,
    /// Filter by location ID.
    pub location_id: Option<i64>,
    /// Filter by sensor ID.
    pub sensor_id: Option<i64>,
}

impl ObservationQuery {
    /// Create a query with no filters (every observation).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter to observations dated on or after `date`.
    pub fn since(mut self, date: Date) -> Self {
        self.since = Some(date);
        self
    }

    /// Filter to observations dated on or before `date`.
    pub fn until(mut self, date: Date) -> Self {
        self.until = Some(date);
        self
    }

    /// Restrict to a single location.
    pub fn location(mut self, location_id: i64) -> Self {
        self.location_id = Some(location_id);
        self
    }

    /// Restrict to a single sensor.
    pub fn sensor(mut self, sensor_id: i64) -> Self {
        self.sensor_id = Some(sensor_id);
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(since) = self.since {
            conditions.push("date >= ?");
            params.push(Box::new(since));
        }

        if let Some(until) = self.until {
            conditions.push("date <= ?");
            params.push(Box::new(until));
        }

        if let Some(location_id) = self.location_id {
            conditions.push("location_id = ?");
            params.push(Box::new(location_id));
        }

        if let Some(sensor_id) = self.sensor_id {
            conditions.push("sensor_id = ?");
            params.push(Box::new(sensor_id));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        format!(
            "SELECT id, location_id, sensor_id, date, count, created_at, updated_at \
             FROM observations {} ORDER BY date ASC, id ASC",
            where_clause
        )
    }
}
