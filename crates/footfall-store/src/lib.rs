//! Local data persistence for visitor-count observations.
//!
//! This crate provides SQLite-based storage for the three record types the
//! footfall service works with:
//!
//! - **Locations**: physical sites
//! - **Sensors**: counters installed at a location (`active` or `inactive`)
//! - **Observations**: one day's visitor count reported by a sensor
//!
//! Writes go through the CRUD methods on [`Store`]. Analytics code reads
//! through the [`RecordSource`] trait, either directly on the store or inside a
//! [`Snapshot`] for a consistent view across several queries.
//!
//! # Example
//!
//! ```no_run
//! use footfall_store::{NewLocation, ObservationQuery, RecordSource, Store};
//!
//! let store = Store::open_default()?;
//! store.insert_location(&NewLocation::named("Lobby"))?;
//!
//! let snapshot = store.snapshot()?;
//! let observations = snapshot.query_observations(&ObservationQuery::new())?;
//! # Ok::<(), footfall_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
pub mod seed;
mod source;
mod store;

pub use error::{Error, Result};
pub use models::{
    Location, LocationTotals, NewLocation, NewObservation, NewSensor, Observation, Page,
    PageRequest, Sensor, SensorStatus,
};
pub use queries::ObservationQuery;
pub use source::{RecordSource, Snapshot};
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/footfall/data.db`
/// - macOS: `~/Library/Application Support/footfall/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\footfall\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("footfall")
        .join("data.db")
}
