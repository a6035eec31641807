use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::error::AppError;
use crate::models::ride::{Ride, RideStatus};

/// In-memory ride store. A plain map behind an `RwLock` rather than a
/// concurrent map: the active-ride-by-rider query needs a point-in-time scan
/// serialized against writers, which per-entry locking cannot give.
#[derive(Default)]
pub struct RideStore {
    rides: RwLock<HashMap<Uuid, Ride>>,
}

impl RideStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Ride>> {
        self.rides.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Ride>> {
        self.rides.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create(&self, ride: Ride) {
        self.write().insert(ride.id, ride);
    }

    pub fn get(&self, id: Uuid) -> Result<Ride, AppError> {
        self.read().get(&id).cloned().ok_or(AppError::RideNotFound(id))
    }

    /// Replaces an existing ride. Refuses to upsert so a delete racing an
    /// update cannot resurrect the ride.
    pub fn update(&self, ride: Ride) -> Result<(), AppError> {
        let mut rides = self.write();
        if !rides.contains_key(&ride.id) {
            return Err(AppError::RideNotFound(ride.id));
        }
        rides.insert(ride.id, ride);
        Ok(())
    }

    pub fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.write()
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::RideNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn by_rider(&self, rider_id: Uuid) -> Vec<Ride> {
        self.read()
            .values()
            .filter(|ride| ride.rider_id == rider_id)
            .cloned()
            .collect()
    }

    pub fn by_driver(&self, driver_id: Uuid) -> Vec<Ride> {
        self.read()
            .values()
            .filter(|ride| ride.driver_id == Some(driver_id))
            .cloned()
            .collect()
    }

    /// The ride currently underway for a rider, if any. `Estimate` rides do
    /// not count — the rider has not committed to them yet.
    pub fn active_ride_for_rider(&self, rider_id: Uuid) -> Option<Ride> {
        use RideStatus::*;
        self.read()
            .values()
            .find(|ride| {
                ride.rider_id == rider_id
                    && matches!(
                        ride.status,
                        Requested | Matching | Accepted | PickingUp | InProgress
                    )
            })
            .cloned()
    }
}
