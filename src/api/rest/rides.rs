use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::position::GeoPoint;
use crate::models::ride::{Ride, RideStatus};
use crate::services::rides::FareEstimate;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides/estimate", post(create_estimate))
        .route("/rides/request", post(request_ride))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/respond", post(respond_to_offer))
        .route("/rides/:id/status", patch(update_status))
        .route("/riders/:id/rides", get(list_rider_rides))
}

#[derive(Deserialize)]
pub struct EstimateRequest {
    pub rider_id: Uuid,
    pub source: GeoPoint,
    pub destination: GeoPoint,
}

#[derive(Deserialize)]
pub struct RequestRideRequest {
    pub rider_id: Uuid,
    pub ride_id: Uuid,
}

#[derive(Deserialize)]
pub struct OfferResponseRequest {
    pub driver_id: Uuid,
    pub accept: bool,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub driver_id: Uuid,
    pub status: RideStatus,
}

fn validate_point(point: &GeoPoint) -> Result<(), AppError> {
    if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lon) {
        return Err(AppError::BadRequest(format!(
            "coordinate ({}, {}) out of range",
            point.lat, point.lon
        )));
    }
    Ok(())
}

async fn create_estimate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EstimateRequest>,
) -> Result<Json<FareEstimate>, AppError> {
    validate_point(&payload.source)?;
    validate_point(&payload.destination)?;

    let estimate =
        state
            .rides
            .create_fare_estimate(payload.rider_id, payload.source, payload.destination);

    Ok(Json(estimate))
}

/// Confirms an estimate and kicks off the matching run. Responds `202` right
/// away; the caller polls `GET /rides/:id` or watches `/ws` for the outcome.
async fn request_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RequestRideRequest>,
) -> Result<(StatusCode, Json<Ride>), AppError> {
    let ride = state.rides.request_ride(payload.rider_id, payload.ride_id)?;

    // The engine reports the outcome through the ride's status and the
    // notification stream, so the result receiver can be dropped here.
    let _outcome = state
        .matching
        .clone()
        .start_matching(ride.clone(), CancellationToken::new());

    Ok((StatusCode::ACCEPTED, Json(ride)))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.get_ride(id)?))
}

/// A driver's accept/decline answer to an offer. Fire-and-forget: answers
/// for rides that have already moved on are dropped by the engine.
async fn respond_to_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<OfferResponseRequest>,
) -> impl IntoResponse {
    state
        .matching
        .submit_driver_response(payload.driver_id, id, payload.accept)
        .await;

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "ride_id": id,
            "message": if payload.accept { "acceptance submitted" } else { "decline submitted" },
        })),
    )
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .rides
        .update_ride_status(payload.driver_id, id, payload.status)?;
    Ok(Json(ride))
}

async fn list_rider_rides(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Ride>> {
    Json(state.rides.rides_for_rider(id))
}
