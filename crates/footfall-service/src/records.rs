//! CRUD endpoints for locations, sensors and visitor observations.
//!
//! Request bodies are validated field by field; every failing rule is
//! reported at once in a 422 response. Sensors are returned with their
//! location embedded, visitor observations with their location and sensor.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use footfall_store::{
    Location, NewLocation, NewObservation, NewSensor, Observation, Page, PageRequest, Sensor,
    SensorStatus, Store,
};
use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;

use crate::error::{AppError, FieldErrors};
use crate::state::AppState;

/// Default page size for paginated listings.
pub const DEFAULT_PER_PAGE: u32 = 15;
/// Largest page size a client may request.
pub const MAX_PER_PAGE: u32 = 100;
/// Longest accepted name.
pub const MAX_NAME_LEN: usize = 255;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/locations", get(list_locations).post(create_location))
        .route(
            "/locations/{id}",
            get(get_location).put(update_location).delete(delete_location),
        )
        .route("/sensors", get(list_sensors).post(create_sensor))
        .route(
            "/sensors/{id}",
            get(get_sensor).put(update_sensor).delete(delete_sensor),
        )
        .route("/visitors", get(list_visitors).post(create_visitor))
        .route(
            "/visitors/{id}",
            get(get_visitor).put(update_visitor).delete(delete_visitor),
        )
}

/// Single-resource and list envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    fn json(data: T) -> Json<Self> {
        Json(Self { data })
    }
}

/// Pagination query parameters.
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE).min(MAX_PER_PAGE);
        PageRequest::new(self.page.unwrap_or(1), per_page)
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn not_found(kind: &str, id: i64) -> AppError {
    AppError::NotFound(format!("{} not found: {}", kind, id))
}

fn required_name(errors: &mut FieldErrors, name: Option<String>) -> String {
    let name = name.map(|n| n.trim().to_string()).unwrap_or_default();
    if name.is_empty() {
        errors.add("name", "The name field is required.");
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.add(
            "name",
            format!(
                "The name field must not be greater than {} characters.",
                MAX_NAME_LEN
            ),
        );
    }
    name
}

/// Check that `location_id` names a stored location.
///
/// Returns 0 when it does not; the recorded field error keeps that value from
/// ever reaching the store.
fn existing_location(
    store: &Store,
    errors: &mut FieldErrors,
    location_id: Option<i64>,
) -> Result<i64, AppError> {
    match location_id {
        None => errors.add("location_id", "The location id field is required."),
        Some(id) if store.get_location(id)?.is_none() => {
            errors.add("location_id", "The selected location id is invalid.")
        }
        Some(id) => return Ok(id),
    }
    Ok(0)
}

/// A sensor with the location it is installed at.
#[derive(Debug, Serialize)]
pub struct SensorResource {
    #[serde(flatten)]
    pub sensor: Sensor,
    pub location: Option<Location>,
}

/// A visitor observation with the location and sensor that reported it.
#[derive(Debug, Serialize)]
pub struct VisitorResource {
    #[serde(flatten)]
    pub observation: Observation,
    pub location: Option<Location>,
    pub sensor: Option<Sensor>,
}

/// Loads the records a response embeds, fetching each id once.
struct Relations<'a> {
    store: &'a Store,
    locations: HashMap<i64, Option<Location>>,
    sensors: HashMap<i64, Option<Sensor>>,
}

impl<'a> Relations<'a> {
    fn new(store: &'a Store) -> Self {
        Self {
            store,
            locations: HashMap::new(),
            sensors: HashMap::new(),
        }
    }

    fn location(&mut self, id: i64) -> Result<Option<Location>, AppError> {
        if let Some(location) = self.locations.get(&id) {
            return Ok(location.clone());
        }
        let location = self.store.get_location(id)?;
        self.locations.insert(id, location.clone());
        Ok(location)
    }

    fn sensor(&mut self, id: i64) -> Result<Option<Sensor>, AppError> {
        if let Some(sensor) = self.sensors.get(&id) {
            return Ok(sensor.clone());
        }
        let sensor = self.store.get_sensor(id)?;
        self.sensors.insert(id, sensor.clone());
        Ok(sensor)
    }

    fn sensor_resource(&mut self, sensor: Sensor) -> Result<SensorResource, AppError> {
        let location = self.location(sensor.location_id)?;
        Ok(SensorResource { sensor, location })
    }

    fn visitor_resource(&mut self, observation: Observation) -> Result<VisitorResource, AppError> {
        let location = self.location(observation.location_id)?;
        let sensor = self.sensor(observation.sensor_id)?;
        Ok(VisitorResource {
            observation,
            location,
            sensor,
        })
    }
}

// Locations

/// Location create/update body.
#[derive(Debug, Deserialize, Default)]
pub struct LocationRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl LocationRequest {
    fn validate(self) -> Result<NewLocation, AppError> {
        let mut errors = FieldErrors::new();
        let name = required_name(&mut errors, self.name);
        errors.into_result()?;
        Ok(NewLocation {
            name,
            address: self.address,
            city: self.city,
            country: self.country,
        })
    }
}

async fn list_locations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataResponse<Vec<Location>>>, AppError> {
    let locations = state.store.lock().await.list_locations()?;
    Ok(DataResponse::json(locations))
}

async fn create_location(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<Location>>), AppError> {
    let location = body(payload)?.validate()?;
    let created = state.store.lock().await.insert_location(&location)?;
    Ok((StatusCode::CREATED, DataResponse::json(created)))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DataResponse<Location>>, AppError> {
    let location = state
        .store
        .lock()
        .await
        .get_location(id)?
        .ok_or_else(|| not_found("Location", id))?;
    Ok(DataResponse::json(location))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> Result<Json<DataResponse<Location>>, AppError> {
    let store = state.store.lock().await;
    if store.get_location(id)?.is_none() {
        return Err(not_found("Location", id));
    }
    let location = body(payload)?.validate()?;
    let updated = store.update_location(id, &location)?;
    Ok(DataResponse::json(updated))
}

async fn delete_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.lock().await.delete_location(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// Sensors

/// Sensor create/update body.
#[derive(Debug, Deserialize, Default)]
pub struct SensorRequest {
    pub name: Option<String>,
    pub status: Option<String>,
    pub location_id: Option<i64>,
}

impl SensorRequest {
    fn validate(self, store: &Store) -> Result<NewSensor, AppError> {
        let mut errors = FieldErrors::new();
        let name = required_name(&mut errors, self.name);

        let status = match self.status.as_deref() {
            None | Some("") => {
                errors.add("status", "The status field is required.");
                SensorStatus::Active
            }
            Some(raw) => raw.parse::<SensorStatus>().unwrap_or_else(|_| {
                errors.add("status", "The selected status is invalid.");
                SensorStatus::Active
            }),
        };

        let location_id = existing_location(store, &mut errors, self.location_id)?;
        errors.into_result()?;

        Ok(NewSensor {
            name,
            status,
            location_id,
        })
    }
}

async fn list_sensors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<Json<Page<SensorResource>>, AppError> {
    let store = state.store.lock().await;
    let mut relations = Relations::new(&store);
    let page = store
        .list_sensors(params.request())?
        .try_map(|sensor| relations.sensor_resource(sensor))?;
    Ok(Json(page))
}

async fn create_sensor(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SensorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<SensorResource>>), AppError> {
    let request = body(payload)?;
    let store = state.store.lock().await;
    let sensor = request.validate(&store)?;
    let created = store.insert_sensor(&sensor)?;
    let resource = Relations::new(&store).sensor_resource(created)?;
    Ok((StatusCode::CREATED, DataResponse::json(resource)))
}

async fn get_sensor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DataResponse<SensorResource>>, AppError> {
    let store = state.store.lock().await;
    let sensor = store
        .get_sensor(id)?
        .ok_or_else(|| not_found("Sensor", id))?;
    let resource = Relations::new(&store).sensor_resource(sensor)?;
    Ok(DataResponse::json(resource))
}

async fn update_sensor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<SensorRequest>, JsonRejection>,
) -> Result<Json<DataResponse<SensorResource>>, AppError> {
    let store = state.store.lock().await;
    if store.get_sensor(id)?.is_none() {
        return Err(not_found("Sensor", id));
    }
    let sensor = body(payload)?.validate(&store)?;
    let updated = store.update_sensor(id, &sensor)?;
    let resource = Relations::new(&store).sensor_resource(updated)?;
    Ok(DataResponse::json(resource))
}

async fn delete_sensor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.lock().await.delete_sensor(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// Visitors

/// Visitor observation create/update body.
#[derive(Debug, Deserialize, Default)]
pub struct VisitorRequest {
    pub location_id: Option<i64>,
    pub sensor_id: Option<i64>,
    /// `YYYY-MM-DD`.
    pub date: Option<String>,
    pub count: Option<i64>,
}

impl VisitorRequest {
    fn validate(self, store: &Store) -> Result<NewObservation, AppError> {
        let mut errors = FieldErrors::new();
        let location_id = existing_location(store, &mut errors, self.location_id)?;

        let sensor_id = match self.sensor_id {
            None => {
                errors.add("sensor_id", "The sensor id field is required.");
                0
            }
            Some(id) if store.get_sensor(id)?.is_none() => {
                errors.add("sensor_id", "The selected sensor id is invalid.");
                0
            }
            Some(id) => id,
        };

        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("date", "The date field is required.");
                Date::MIN
            }
            Some(raw) => parse_date(raw).unwrap_or_else(|| {
                errors.add("date", "The date field must be a valid date.");
                Date::MIN
            }),
        };

        let count = match self.count {
            None => {
                errors.add("count", "The count field is required.");
                0
            }
            Some(n) if n < 0 => {
                errors.add("count", "The count field must be at least 0.");
                0
            }
            Some(n) => n as u64,
        };

        errors.into_result()?;

        Ok(NewObservation {
            location_id,
            sensor_id,
            date,
            count,
        })
    }
}

fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
}

async fn list_visitors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<Json<Page<VisitorResource>>, AppError> {
    let store = state.store.lock().await;
    let mut relations = Relations::new(&store);
    let page = store
        .list_observations(params.request())?
        .try_map(|observation| relations.visitor_resource(observation))?;
    Ok(Json(page))
}

async fn create_visitor(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VisitorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<VisitorResource>>), AppError> {
    let request = body(payload)?;
    let store = state.store.lock().await;
    let observation = request.validate(&store)?;
    let created = store.insert_observation(&observation)?;
    let resource = Relations::new(&store).visitor_resource(created)?;
    Ok((StatusCode::CREATED, DataResponse::json(resource)))
}

async fn get_visitor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DataResponse<VisitorResource>>, AppError> {
    let store = state.store.lock().await;
    let observation = store
        .get_observation(id)?
        .ok_or_else(|| not_found("Visitor", id))?;
    let resource = Relations::new(&store).visitor_resource(observation)?;
    Ok(DataResponse::json(resource))
}

async fn update_visitor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<VisitorRequest>, JsonRejection>,
) -> Result<Json<DataResponse<VisitorResource>>, AppError> {
    let store = state.store.lock().await;
    if store.get_observation(id)?.is_none() {
        return Err(not_found("Visitor", id));
    }
    let observation = body(payload)?.validate(&store)?;
    let updated = store.update_observation(id, &observation)?;
    let resource = Relations::new(&store).visitor_resource(updated)?;
    Ok(DataResponse::json(resource))
}

async fn delete_visitor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let store = state.store.lock().await;
    if store.get_observation(id)?.is_none() {
        return Err(not_found("Visitor", id));
    }
    store.delete_observation(id)?;
    Ok(StatusCode::NO_CONTENT)
}
