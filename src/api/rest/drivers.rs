use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::DriverStatus;
use crate::models::position::{DriverPosition, GeoPoint};
use crate::models::ride::Ride;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/drivers/:id/location",
            patch(update_location)
                .get(get_location)
                .delete(remove_location),
        )
        .route("/drivers/:id/rides", get(list_rides))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub lat: f64,
    pub lon: f64,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<DriverPosition>, AppError> {
    let point = GeoPoint {
        lat: payload.lat,
        lon: payload.lon,
    };
    if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lon) {
        return Err(AppError::BadRequest(format!(
            "coordinate ({}, {}) out of range",
            point.lat, point.lon
        )));
    }

    let position = state
        .locations
        .update_driver_location(id, point.lat, point.lon);

    Ok(Json(position))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverPosition>, AppError> {
    state
        .locations
        .get_driver_position(id)
        .map(Json)
        .ok_or(AppError::DriverNotFound(id))
}

/// End of shift: drop the driver from the index and mark them offline.
async fn remove_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<serde_json::Value> {
    state.locations.remove_driver_location(id);
    let _ = state.drivers.set_status(id, DriverStatus::Offline);

    Json(json!({ "driver_id": id, "status": "offline" }))
}

async fn list_rides(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Ride>> {
    Json(state.rides.rides_for_driver(id))
}
