use std::sync::Arc;

use uuid::Uuid;

use crate::geo::spatial::{DriverDistance, SpatialIndex};
use crate::models::driver::DriverStatus;
use crate::models::position::{DriverPosition, GeoPoint};
use crate::observability::metrics::Metrics;
use crate::store::drivers::DriverStore;
use crate::store::locations::LocationStore;

/// Couples the spatial index with driver availability. The matching engine
/// only ever talks to this service, never to the index directly.
pub struct LocationService {
    index: Arc<SpatialIndex>,
    drivers: Arc<DriverStore>,
    locations: Arc<LocationStore>,
    metrics: Metrics,
}

impl LocationService {
    pub fn new(
        index: Arc<SpatialIndex>,
        drivers: Arc<DriverStore>,
        locations: Arc<LocationStore>,
        metrics: Metrics,
    ) -> Self {
        Self {
            index,
            drivers,
            locations,
            metrics,
        }
    }

    /// Processes a GPS ping. Unknown drivers are provisioned on the spot,
    /// and a ping from an offline driver brings them back on shift.
    pub fn update_driver_location(&self, driver_id: Uuid, lat: f64, lon: f64) -> DriverPosition {
        let driver = self.drivers.get_or_create(driver_id);
        if driver.status == DriverStatus::Offline {
            let _ = self.drivers.set_status(driver_id, DriverStatus::Available);
        }

        let position = self.index.update(driver_id, lat, lon);
        self.locations.upsert(position.clone());
        self.metrics.drivers_tracked.set(self.index.count() as i64);

        position
    }

    pub fn get_driver_position(&self, driver_id: Uuid) -> Option<DriverPosition> {
        self.locations.get(driver_id)
    }

    /// Drivers near `origin` that are `Available` right now, nearest first.
    /// The status re-check matters: a driver can be booked between their last
    /// ping and this query.
    pub fn find_nearby_available(&self, origin: GeoPoint, radius_km: f64) -> Vec<DriverDistance> {
        self.index
            .find_nearby(origin.lat, origin.lon, radius_km)
            .into_iter()
            .filter(|candidate| {
                self.drivers
                    .get(candidate.position.driver_id)
                    .map(|driver| driver.is_available())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Drops the driver from the index and position store, e.g. at the end
    /// of a shift.
    pub fn remove_driver_location(&self, driver_id: Uuid) {
        self.index.remove(driver_id);
        self.locations.remove(driver_id);
        self.metrics.drivers_tracked.set(self.index.count() as i64);
    }

    pub fn tracked_drivers(&self) -> usize {
        self.index.count()
    }
}
