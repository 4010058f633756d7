//! Read-only query interface consumed by the analytics layer.
//!
//! [`RecordSource`] is implemented by [`Store`] (each call sees the latest
//! committed data) and by [`Snapshot`] (every call inside one snapshot sees the
//! same committed state, even if writers commit in between).

use rusqlite::{Connection, Transaction};

use crate::error::Result;
use crate::models::{LocationTotals, Observation, SensorStatus};
use crate::queries::ObservationQuery;
use crate::store::{LOCATION_COLUMNS, Store, location_from_row, observation_from_row};

/// Read-only access to location, sensor and observation records.
pub trait RecordSource {
    /// Observations matching the query, ordered by date then ID.
    fn query_observations(&self, query: &ObservationQuery) -> Result<Vec<Observation>>;

    /// Number of locations in the store.
    fn count_locations(&self) -> Result<u64>;

    /// Number of sensors, optionally restricted to one status.
    fn count_sensors(&self, status: Option<SensorStatus>) -> Result<u64>;

    /// Every location in ID order with its summed visitor count and sensor count.
    fn list_locations_with_counts(&self) -> Result<Vec<LocationTotals>>;
}

/// A consistent read view over the store.
///
/// Backed by a deferred SQLite transaction that is rolled back on drop, so it
/// never writes.
pub struct Snapshot<'a> {
    tx: Transaction<'a>,
}

impl Store {
    /// Begin a read snapshot.
    ///
    /// Fails if another snapshot on this store is still open.
    pub fn snapshot(&self) -> Result<Snapshot<'_>> {
        let tx = self.connection().unchecked_transaction()?;
        Ok(Snapshot { tx })
    }
}

impl RecordSource for Store {
    fn query_observations(&self, query: &ObservationQuery) -> Result<Vec<Observation>> {
        query_observations(self.connection(), query)
    }

    fn count_locations(&self) -> Result<u64> {
        count_locations(self.connection())
    }

    fn count_sensors(&self, status: Option<SensorStatus>) -> Result<u64> {
        count_sensors(self.connection(), status)
    }

    fn list_locations_with_counts(&self) -> Result<Vec<LocationTotals>> {
        list_locations_with_counts(self.connection())
    }
}

impl RecordSource for Snapshot<'_> {
    fn query_observations(&self, query: &ObservationQuery) -> Result<Vec<Observation>> {
        query_observations(&self.tx, query)
    }

    fn count_locations(&self) -> Result<u64> {
        count_locations(&self.tx)
    }

    fn count_sensors(&self, status: Option<SensorStatus>) -> Result<u64> {
        count_sensors(&self.tx, status)
    }

    fn list_locations_with_counts(&self) -> Result<Vec<LocationTotals>> {
        list_locations_with_counts(&self.tx)
    }
}

fn query_observations(conn: &Connection, query: &ObservationQuery) -> Result<Vec<Observation>> {
    let sql = query.build_sql();
    let (_, params) = query.build_where();

    tracing::debug!("Executing query: {}", sql);

    let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let observations = stmt
        .query_map(params_ref.as_slice(), observation_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(observations)
}

fn count_locations(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
    Ok(count as u64)
}

fn count_sensors(conn: &Connection, status: Option<SensorStatus>) -> Result<u64> {
    let count: i64 = match status {
        Some(status) => conn.query_row(
            "SELECT COUNT(*) FROM sensors WHERE status = ?",
            [status.as_str()],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM sensors", [], |row| row.get(0))?,
    };
    Ok(count as u64)
}

fn list_locations_with_counts(conn: &Connection) -> Result<Vec<LocationTotals>> {
    let sql = format!(
        "SELECT {},
            (SELECT COALESCE(SUM(o.count), 0) FROM observations o WHERE o.location_id = l.id),
            (SELECT COUNT(*) FROM sensors s WHERE s.location_id = l.id)
         FROM locations l ORDER BY l.id",
        LOCATION_COLUMNS
            .split(", ")
            .map(|c| format!("l.{}", c))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(LocationTotals {
                location: location_from_row(row)?,
                visitor_total: row.get::<_, i64>(7)?.max(0) as u64,
                sensor_count: row.get::<_, i64>(8)?.max(0) as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewLocation, NewObservation, NewSensor};
    use time::macros::date;

    fn sensor(store: &Store, location_id: i64, status: SensorStatus) -> i64 {
        store
            .insert_sensor(&NewSensor {
                name: "Infrared Counter 1".to_string(),
                status,
                location_id,
            })
            .unwrap()
            .id
    }

    fn observe(store: &Store, location_id: i64, sensor_id: i64, date: time::Date, count: u64) {
        store
            .insert_observation(&NewObservation {
                location_id,
                sensor_id,
                date,
                count,
            })
            .unwrap();
    }

    #[test]
    fn test_empty_store_counts() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.count_locations().unwrap(), 0);
        assert_eq!(store.count_sensors(None).unwrap(), 0);
        assert_eq!(store.count_sensors(Some(SensorStatus::Active)).unwrap(), 0);
        assert!(store.list_locations_with_counts().unwrap().is_empty());
        assert!(
            store
                .query_observations(&ObservationQuery::new())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_count_sensors_by_status() {
        let store = Store::open_in_memory().unwrap();
        let loc = store.insert_location(&NewLocation::named("A")).unwrap().id;
        sensor(&store, loc, SensorStatus::Active);
        sensor(&store, loc, SensorStatus::Active);
        sensor(&store, loc, SensorStatus::Inactive);

        assert_eq!(store.count_sensors(None).unwrap(), 3);
        assert_eq!(store.count_sensors(Some(SensorStatus::Active)).unwrap(), 2);
        assert_eq!(
            store.count_sensors(Some(SensorStatus::Inactive)).unwrap(),
            1
        );
    }

    #[test]
    fn test_query_observations_filters() {
        let store = Store::open_in_memory().unwrap();
        let a = store.insert_location(&NewLocation::named("A")).unwrap().id;
        let b = store.insert_location(&NewLocation::named("B")).unwrap().id;
        let sa = sensor(&store, a, SensorStatus::Active);
        let sb = sensor(&store, b, SensorStatus::Active);

        observe(&store, a, sa, date!(2025 - 06 - 10), 1);
        observe(&store, a, sa, date!(2025 - 06 - 14), 2);
        observe(&store, b, sb, date!(2025 - 06 - 14), 3);

        let since = store
            .query_observations(&ObservationQuery::new().since(date!(2025 - 06 - 14)))
            .unwrap();
        assert_eq!(since.len(), 2);

        let only_a = store
            .query_observations(&ObservationQuery::new().location(a))
            .unwrap();
        assert_eq!(only_a.len(), 2);
        assert!(only_a.iter().all(|o| o.location_id == a));
        assert!(only_a[0].date < only_a[1].date);
    }

    #[test]
    fn test_list_locations_with_counts_sums_visitors() {
        let store = Store::open_in_memory().unwrap();
        let a = store.insert_location(&NewLocation::named("A")).unwrap().id;
        let b = store.insert_location(&NewLocation::named("B")).unwrap().id;
        let sa1 = sensor(&store, a, SensorStatus::Active);
        sensor(&store, a, SensorStatus::Inactive);

        observe(&store, a, sa1, date!(2025 - 06 - 13), 7);
        observe(&store, a, sa1, date!(2025 - 06 - 14), 8);

        let totals = store.list_locations_with_counts().unwrap();
        assert_eq!(totals.len(), 2);

        assert_eq!(totals[0].location.id, a);
        assert_eq!(totals[0].visitor_total, 15);
        assert_eq!(totals[0].sensor_count, 2);

        assert_eq!(totals[1].location.id, b);
        assert_eq!(totals[1].visitor_total, 0);
        assert_eq!(totals[1].sensor_count, 0);
    }

    #[test]
    fn test_snapshot_reads_same_as_store() {
        let store = Store::open_in_memory().unwrap();
        let a = store.insert_location(&NewLocation::named("A")).unwrap().id;
        let s = sensor(&store, a, SensorStatus::Active);
        observe(&store, a, s, date!(2025 - 06 - 14), 4);

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.count_locations().unwrap(), 1);
        assert_eq!(snapshot.count_sensors(Some(SensorStatus::Active)).unwrap(), 1);
        assert_eq!(
            snapshot
                .query_observations(&ObservationQuery::new())
                .unwrap()
                .len(),
            1
        );
        assert_eq!(snapshot.list_locations_with_counts().unwrap()[0].visitor_total, 4);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_commits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.db");

        let reader = Store::open(&path).unwrap();
        let writer = Store::open(&path).unwrap();
        let a = writer.insert_location(&NewLocation::named("A")).unwrap().id;

        let snapshot = reader.snapshot().unwrap();
        assert_eq!(snapshot.count_locations().unwrap(), 1);

        writer.insert_location(&NewLocation::named("B")).unwrap();
        assert_eq!(snapshot.count_locations().unwrap(), 1);
        drop(snapshot);

        assert_eq!(reader.count_locations().unwrap(), 2);
        assert!(reader.get_location(a).unwrap().is_some());
    }
}
