//! Main store implementation.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{
    Location, NewLocation, NewObservation, NewSensor, Observation, Page, PageRequest, Sensor,
};
use crate::schema;

/// SQLite-based store for locations, sensors and visitor observations.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn now_ts() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let ts: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp(ts).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

fn count_to_sql(count: u64) -> Result<i64> {
    i64::try_from(count)
        .map_err(|_| Error::InvalidRecord(format!("visitor count {} is out of range", count)))
}

pub(crate) const LOCATION_COLUMNS: &str =
    "id, name, address, city, country, created_at, updated_at";
const SENSOR_COLUMNS: &str = "id, name, status, location_id, created_at, updated_at";
const OBSERVATION_COLUMNS: &str =
    "id, location_id, sensor_id, date, count, created_at, updated_at";

pub(crate) fn location_from_row(row: &Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        city: row.get(3)?,
        country: row.get(4)?,
        created_at: timestamp_at(row, 5)?,
        updated_at: timestamp_at(row, 6)?,
    })
}

fn sensor_from_row(row: &Row<'_>) -> rusqlite::Result<Sensor> {
    let status: String = row.get(2)?;
    Ok(Sensor {
        id: row.get(0)?,
        name: row.get(1)?,
        status: status.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
        })?,
        location_id: row.get(3)?,
        created_at: timestamp_at(row, 4)?,
        updated_at: timestamp_at(row, 5)?,
    })
}

pub(crate) fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<Observation> {
    Ok(Observation {
        id: row.get(0)?,
        location_id: row.get(1)?,
        sensor_id: row.get(2)?,
        date: row.get(3)?,
        count: row.get::<_, i64>(4)?.max(0) as u64,
        created_at: timestamp_at(row, 5)?,
        updated_at: timestamp_at(row, 6)?,
    })
}

// Location operations
impl Store {
    /// Insert a new location.
    pub fn insert_location(&self, location: &NewLocation) -> Result<Location> {
        let now = now_ts();
        self.conn.execute(
            "INSERT INTO locations (name, address, city, country, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![
                location.name,
                location.address,
                location.city,
                location.country,
                now
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted location {} ({})", id, location.name);
        self.get_location(id)?
            .ok_or_else(|| Error::not_found("Location", id))
    }

    /// Get a location by ID.
    pub fn get_location(&self, id: i64) -> Result<Option<Location>> {
        let sql = format!("SELECT {} FROM locations WHERE id = ?", LOCATION_COLUMNS);
        let location = self
            .conn
            .query_row(&sql, [id], location_from_row)
            .optional()?;
        Ok(location)
    }

    /// List all locations in ID order.
    pub fn list_locations(&self) -> Result<Vec<Location>> {
        let sql = format!("SELECT {} FROM locations ORDER BY id", LOCATION_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let locations = stmt
            .query_map([], location_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(locations)
    }

    /// Replace the fields of an existing location.
    pub fn update_location(&self, id: i64, location: &NewLocation) -> Result<Location> {
        let changed = self.conn.execute(
            "UPDATE locations SET name = ?2, address = ?3, city = ?4, country = ?5,
                updated_at = ?6
             WHERE id = ?1",
            rusqlite::params![
                id,
                location.name,
                location.address,
                location.city,
                location.country,
                now_ts()
            ],
        )?;

        if changed == 0 {
            return Err(Error::not_found("Location", id));
        }

        self.get_location(id)?
            .ok_or_else(|| Error::not_found("Location", id))
    }

    /// Delete a location together with its sensors and observations.
    pub fn delete_location(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM locations WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(Error::not_found("Location", id));
        }
        info!("Deleted location {}", id);
        Ok(())
    }
}

// Sensor operations
impl Store {
    /// Insert a new sensor.
    pub fn insert_sensor(&self, sensor: &NewSensor) -> Result<Sensor> {
        let now = now_ts();
        self.conn.execute(
            "INSERT INTO sensors (name, status, location_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![sensor.name, sensor.status.as_str(), sensor.location_id, now],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted sensor {} at location {}", id, sensor.location_id);
        self.get_sensor(id)?
            .ok_or_else(|| Error::not_found("Sensor", id))
    }

    /// Get a sensor by ID.
    pub fn get_sensor(&self, id: i64) -> Result<Option<Sensor>> {
        let sql = format!("SELECT {} FROM sensors WHERE id = ?", SENSOR_COLUMNS);
        let sensor = self
            .conn
            .query_row(&sql, [id], sensor_from_row)
            .optional()?;
        Ok(sensor)
    }

    /// List sensors one page at a time, in ID order.
    pub fn list_sensors(&self, page: PageRequest) -> Result<Page<Sensor>> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sensors", [], |row| row.get(0))?;

        let sql = format!(
            "SELECT {} FROM sensors ORDER BY id LIMIT ?1 OFFSET ?2",
            SENSOR_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let sensors = stmt
            .query_map(
                rusqlite::params![page.per_page, page.offset() as i64],
                sensor_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Page::new(sensors, total as u64, page))
    }

    /// Replace the fields of an existing sensor.
    pub fn update_sensor(&self, id: i64, sensor: &NewSensor) -> Result<Sensor> {
        let changed = self.conn.execute(
            "UPDATE sensors SET name = ?2, status = ?3, location_id = ?4, updated_at = ?5
             WHERE id = ?1",
            rusqlite::params![
                id,
                sensor.name,
                sensor.status.as_str(),
                sensor.location_id,
                now_ts()
            ],
        )?;

        if changed == 0 {
            return Err(Error::not_found("Sensor", id));
        }

        self.get_sensor(id)?
            .ok_or_else(|| Error::not_found("Sensor", id))
    }

    /// Delete a sensor and its observations.
    pub fn delete_sensor(&self, id: i64) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM sensors WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(Error::not_found("Sensor", id));
        }
        info!("Deleted sensor {}", id);
        Ok(())
    }
}

// Observation operations
impl Store {
    /// Insert a new visitor-count observation.
    pub fn insert_observation(&self, observation: &NewObservation) -> Result<Observation> {
        let now = now_ts();
        self.conn.execute(
            "INSERT INTO observations (location_id, sensor_id, date, count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![
                observation.location_id,
                observation.sensor_id,
                observation.date,
                count_to_sql(observation.count)?,
                now
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_observation(id)?
            .ok_or_else(|| Error::not_found("Observation", id))
    }

    /// Get an observation by ID.
    pub fn get_observation(&self, id: i64) -> Result<Option<Observation>> {
        let sql = format!(
            "SELECT {} FROM observations WHERE id = ?",
            OBSERVATION_COLUMNS
        );
        let observation = self
            .conn
            .query_row(&sql, [id], observation_from_row)
            .optional()?;
        Ok(observation)
    }

    /// List observations one page at a time, newest date first.
    pub fn list_observations(&self, page: PageRequest) -> Result<Page<Observation>> {
        let total: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;

        let sql = format!(
            "SELECT {} FROM observations ORDER BY date DESC, id DESC LIMIT ?1 OFFSET ?2",
            OBSERVATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let observations = stmt
            .query_map(
                rusqlite::params![page.per_page, page.offset() as i64],
                observation_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Page::new(observations, total as u64, page))
    }

    /// Replace the fields of an existing observation.
    pub fn update_observation(&self, id: i64, observation: &NewObservation) -> Result<Observation> {
        let changed = self.conn.execute(
            "UPDATE observations SET location_id = ?2, sensor_id = ?3, date = ?4, count = ?5,
                updated_at = ?6
             WHERE id = ?1",
            rusqlite::params![
                id,
                observation.location_id,
                observation.sensor_id,
                observation.date,
                count_to_sql(observation.count)?,
                now_ts()
            ],
        )?;

        if changed == 0 {
            return Err(Error::not_found("Observation", id));
        }

        self.get_observation(id)?
            .ok_or_else(|| Error::not_found("Observation", id))
    }

    /// Delete an observation.
    pub fn delete_observation(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM observations WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(Error::not_found("Observation", id));
        }
        Ok(())
    }
}
