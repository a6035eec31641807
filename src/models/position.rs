use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// A driver's last reported position. `cell` is the geohash of `location` at
/// the spatial index's configured precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPosition {
    pub driver_id: Uuid,
    pub location: GeoPoint,
    pub cell: String,
    pub updated_at: DateTime<Utc>,
}
