use dashmap::DashMap;
use uuid::Uuid;

use crate::models::position::DriverPosition;

/// Last known position per driver, kept beside the spatial index for direct
/// by-driver lookups and debugging. The spatial index owns the cell layout.
#[derive(Default)]
pub struct LocationStore {
    positions: DashMap<Uuid, DriverPosition>,
}

impl LocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, position: DriverPosition) {
        self.positions.insert(position.driver_id, position);
    }

    pub fn get(&self, driver_id: Uuid) -> Option<DriverPosition> {
        self.positions
            .get(&driver_id)
            .map(|entry| entry.value().clone())
    }

    pub fn remove(&self, driver_id: Uuid) {
        self.positions.remove(&driver_id);
    }
}
