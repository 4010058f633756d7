//! Demo data generation.
//!
//! Populates a store with a handful of office locations, a few sensors per
//! location and a month of visitor counts shaped by the day of the week.

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use time::{Date, Duration, Weekday};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{NewLocation, NewObservation, NewSensor, Sensor, SensorStatus};
use crate::store::Store;

const LOCATIONS: [(&str, &str, &str); 5] = [
    ("Main Office Building", "123 Business District", "New York"),
    ("Branch Office Downtown", "456 Downtown Avenue", "Los Angeles"),
    ("Corporate Headquarters", "789 Corporate Plaza", "Chicago"),
    ("Regional Office East", "321 East Side Street", "Miami"),
    ("Tech Hub Center", "654 Innovation Drive", "San Francisco"),
];

const SENSOR_TYPES: [&str; 8] = [
    "Motion Sensor",
    "Door Entry Sensor",
    "Infrared Counter",
    "Pressure Mat Sensor",
    "Beam Break Sensor",
    "Camera Counter",
    "RFID Reader",
    "Bluetooth Beacon",
];

/// Days before `today` that get an extra burst of event traffic.
const EVENT_DAYS_AGO: [i64; 3] = [7, 14, 21];

/// Longest history [`seed_demo_data`] will generate.
pub const MAX_SEED_DAYS: u32 = 36_500;

/// Options for [`seed_demo_data`].
#[derive(Debug, Clone)]
pub struct SeedOptions {
    /// The last day to generate data for.
    pub today: Date,
    /// How many days back from `today` to generate.
    pub days: u32,
}

/// What a seeding run created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub locations: u64,
    pub sensors: u64,
    pub active_sensors: u64,
    pub observations: u64,
    pub total_visitors: u64,
}

/// Fill the store with demo locations, sensors and observations.
///
/// Runs in one transaction: on error nothing is left behind.
pub fn seed_demo_data<R: Rng + ?Sized>(
    store: &Store,
    options: &SeedOptions,
    rng: &mut R,
) -> Result<SeedSummary> {
    if options.days > MAX_SEED_DAYS
        || options
            .today
            .checked_sub(Duration::days(i64::from(options.days)))
            .is_none()
    {
        return Err(Error::InvalidInput(format!(
            "cannot seed {} days back from {}",
            options.days, options.today
        )));
    }

    let tx = store.connection().unchecked_transaction()?;
    let mut summary = SeedSummary::default();

    let mut sensors: Vec<Sensor> = Vec::new();
    for (name, address, city) in LOCATIONS {
        let location = store.insert_location(&NewLocation {
            name: name.to_string(),
            address: Some(address.to_string()),
            city: Some(city.to_string()),
            country: Some("USA".to_string()),
        })?;
        summary.locations += 1;
        info!("Created location: {}", location.name);

        let sensor_count = rng.random_range(2..=4);
        for i in 0..sensor_count {
            let kind = SENSOR_TYPES.choose(rng).copied().unwrap_or(SENSOR_TYPES[0]);
            let status = if rng.random_bool(0.9) {
                SensorStatus::Active
            } else {
                SensorStatus::Inactive
            };
            let sensor = store.insert_sensor(&NewSensor {
                name: format!("{} {}", kind, i + 1),
                status,
                location_id: location.id,
            })?;
            summary.sensors += 1;
            if status == SensorStatus::Active {
                summary.active_sensors += 1;
            }
            sensors.push(sensor);
        }
    }

    for offset in (0..=i64::from(options.days)).rev() {
        let date = options.today - Duration::days(offset);
        for sensor in &sensors {
            // Sensors do not report every day
            if rng.random_ratio(3, 10) {
                continue;
            }

            let base = weekday_base_count(date.weekday(), rng);
            let count = (base + rng.random_range(-5..=10)).max(1) as u64;
            record(store, sensor, date, count, &mut summary)?;
        }
    }

    for days_ago in EVENT_DAYS_AGO {
        if days_ago > i64::from(options.days) || sensors.is_empty() {
            continue;
        }
        let date = options.today - Duration::days(days_ago);
        let amount = rng.random_range(3..=6).min(sensors.len());

        let mut picked: Vec<&Sensor> = sensors.iter().collect();
        picked.shuffle(rng);
        for sensor in picked.into_iter().take(amount) {
            let count = rng.random_range(50..=100);
            record(store, sensor, date, count, &mut summary)?;
        }
        info!("Added special event data for {}", date);
    }

    tx.commit()?;
    info!(
        "Seeding complete: {} locations, {} sensors ({} active), {} observations, {} visitors",
        summary.locations,
        summary.sensors,
        summary.active_sensors,
        summary.observations,
        summary.total_visitors
    );

    Ok(summary)
}

fn record(
    store: &Store,
    sensor: &Sensor,
    date: Date,
    count: u64,
    summary: &mut SeedSummary,
) -> Result<()> {
    store.insert_observation(&NewObservation {
        location_id: sensor.location_id,
        sensor_id: sensor.id,
        date,
        count,
    })?;
    summary.observations += 1;
    summary.total_visitors += count;
    Ok(())
}

/// Weekends are quiet, midweek peaks.
fn weekday_base_count<R: Rng + ?Sized>(weekday: Weekday, rng: &mut R) -> i64 {
    match weekday {
        Weekday::Saturday | Weekday::Sunday => rng.random_range(2..=8),
        Weekday::Monday => rng.random_range(15..=35),
        Weekday::Tuesday | Weekday::Wednesday | Weekday::Thursday => rng.random_range(20..=45),
        Weekday::Friday => rng.random_range(10..=25),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RecordSource;
    use crate::queries::ObservationQuery;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use time::macros::date;

    #[test]
    fn test_seed_demo_data_populates_store() {
        let store = Store::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let options = SeedOptions {
            today: date!(2025 - 06 - 14),
            days: 30,
        };

        let summary = seed_demo_data(&store, &options, &mut rng).unwrap();

        assert_eq!(summary.locations, 5);
        assert!((10..=20).contains(&summary.sensors));
        assert_eq!(store.count_locations().unwrap(), 5);
        assert_eq!(store.count_sensors(None).unwrap(), summary.sensors);
        assert_eq!(
            store.count_sensors(Some(SensorStatus::Active)).unwrap(),
            summary.active_sensors
        );

        let observations = store.query_observations(&ObservationQuery::new()).unwrap();
        assert_eq!(observations.len() as u64, summary.observations);
        assert_eq!(
            observations.iter().map(|o| o.count).sum::<u64>(),
            summary.total_visitors
        );
        assert!(observations.iter().all(|o| o.count >= 1));
        assert!(
            observations
                .iter()
                .all(|o| o.date >= date!(2025 - 05 - 15) && o.date <= date!(2025 - 06 - 14))
        );
    }

    #[test]
    fn test_seed_rejects_window_before_min_date() {
        let store = Store::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let too_early = SeedOptions {
            today: Date::MIN + Duration::days(3),
            days: 30,
        };
        let err = seed_demo_data(&store, &too_early, &mut rng).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let too_long = SeedOptions {
            today: date!(2025 - 06 - 14),
            days: MAX_SEED_DAYS + 1,
        };
        assert!(seed_demo_data(&store, &too_long, &mut rng).is_err());
        assert_eq!(store.count_locations().unwrap(), 0);
    }

    #[test]
    fn test_failed_seed_rolls_back() {
        let store = Store::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch("DROP TABLE observations")
            .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let options = SeedOptions {
            today: date!(2025 - 06 - 14),
            days: 30,
        };

        assert!(seed_demo_data(&store, &options, &mut rng).is_err());
        assert_eq!(store.count_locations().unwrap(), 0);
        assert_eq!(store.count_sensors(None).unwrap(), 0);
    }

    #[test]
    fn test_weekend_counts_are_low() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let count = weekday_base_count(Weekday::Sunday, &mut rng);
            assert!((2..=8).contains(&count));
        }
    }
}
