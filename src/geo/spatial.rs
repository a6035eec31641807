use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::geo::{self, geohash};
use crate::models::position::{DriverPosition, GeoPoint};

/// A candidate returned by a proximity query.
#[derive(Debug, Clone)]
pub struct DriverDistance {
    pub position: DriverPosition,
    pub distance_km: f64,
}

/// In-memory geospatial index of driver positions, partitioned by geohash
/// cell. A proximity query only inspects the query point's cell and its 8
/// neighbors rather than every driver in the system.
///
/// Readers share the index; writers are exclusive. Every public operation is
/// individually atomic and no guard outlives the call.
pub struct SpatialIndex {
    precision: usize,
    inner: RwLock<Cells>,
}

#[derive(Default)]
struct Cells {
    /// cell -> driver -> position
    drivers: HashMap<String, HashMap<Uuid, DriverPosition>>,
    /// driver -> current cell, so update and remove skip the cell scan
    cell_of: HashMap<Uuid, String>,
}

impl Cells {
    fn remove_driver(&mut self, driver_id: Uuid) {
        let Some(cell) = self.cell_of.remove(&driver_id) else {
            return;
        };
        if let Some(occupants) = self.drivers.get_mut(&cell) {
            occupants.remove(&driver_id);
            if occupants.is_empty() {
                self.drivers.remove(&cell);
            }
        }
    }
}

impl SpatialIndex {
    pub fn new(precision: usize) -> Self {
        Self {
            precision,
            inner: RwLock::new(Cells::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Cells> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Cells> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a fresh position for `driver_id`, moving it between cells if
    /// the new coordinate hashes differently. At most one position per driver
    /// exists at any instant.
    pub fn update(&self, driver_id: Uuid, lat: f64, lon: f64) -> DriverPosition {
        let cell = geohash::encode(lat, lon, self.precision);
        let position = DriverPosition {
            driver_id,
            location: GeoPoint { lat, lon },
            cell: cell.clone(),
            updated_at: Utc::now(),
        };

        let mut cells = self.write();
        cells.remove_driver(driver_id);
        cells
            .drivers
            .entry(cell.clone())
            .or_default()
            .insert(driver_id, position.clone());
        cells.cell_of.insert(driver_id, cell);

        position
    }

    pub fn remove(&self, driver_id: Uuid) {
        self.write().remove_driver(driver_id);
    }

    pub fn get(&self, driver_id: Uuid) -> Option<DriverPosition> {
        let cells = self.read();
        let cell = cells.cell_of.get(&driver_id)?;
        cells.drivers.get(cell)?.get(&driver_id).cloned()
    }

    /// Drivers within `radius_km` of the query point, nearest first. Only the
    /// query cell and its 8 neighbors are searched — drivers further out than
    /// the 3x3 block are not part of the contract even when the radius would
    /// reach them.
    pub fn find_nearby(&self, lat: f64, lon: f64, radius_km: f64) -> Vec<DriverDistance> {
        let origin = GeoPoint { lat, lon };
        let center = geohash::encode(lat, lon, self.precision);

        let cells = self.read();
        let mut candidates = Vec::new();

        for cell in geohash::all_neighbors(&center) {
            let Some(occupants) = cells.drivers.get(&cell) else {
                continue;
            };
            for position in occupants.values() {
                let distance_km = geo::haversine_km(&origin, &position.location);
                if distance_km <= radius_km {
                    candidates.push(DriverDistance {
                        position: position.clone(),
                        distance_km,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        candidates
    }

    pub fn count(&self) -> usize {
        self.read().cell_of.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn update_returns_the_indexed_position() {
        let index = SpatialIndex::new(6);
        let position = index.update(driver(1), 37.7749, -122.4194);

        assert_eq!(position.driver_id, driver(1));
        assert_eq!(position.location.lat, 37.7749);
        assert_eq!(position.location.lon, -122.4194);
        assert_eq!(position.cell, "9q8yyk");
    }

    #[test]
    fn a_driver_occupies_exactly_one_cell() {
        let index = SpatialIndex::new(6);
        index.update(driver(1), 37.7749, -122.4194);
        // Move far enough to land in a different cell.
        index.update(driver(1), 40.7128, -74.0060);

        assert_eq!(index.count(), 1);
        let position = index.get(driver(1)).unwrap();
        assert_eq!(position.cell, "dr5reg");

        // The old cell must not still report the driver.
        assert!(index.find_nearby(37.7749, -122.4194, 5.0).is_empty());
    }

    #[test]
    fn remove_clears_the_driver() {
        let index = SpatialIndex::new(6);
        index.update(driver(1), 37.7749, -122.4194);
        assert_eq!(index.count(), 1);

        index.remove(driver(1));
        assert_eq!(index.count(), 0);
        assert!(index.get(driver(1)).is_none());

        // Removing an unknown driver is a no-op.
        index.remove(driver(2));
    }

    #[test]
    fn find_nearby_sorts_by_distance_and_respects_the_radius() {
        let index = SpatialIndex::new(6);
        index.update(driver(1), 37.7749, -122.4194);
        index.update(driver(2), 37.7789, -122.4194);
        index.update(driver(3), 37.7839, -122.4194);
        // ~55 km north, outside any 5 km radius.
        index.update(driver(4), 38.2749, -122.4194);

        let nearby = index.find_nearby(37.7749, -122.4194, 5.0);

        assert!(nearby.len() >= 2);
        assert_eq!(nearby[0].position.driver_id, driver(1));
        for pair in nearby.windows(2) {
            assert!(pair[0].distance_km <= pair[1].distance_km);
        }
        for candidate in &nearby {
            assert!(candidate.distance_km <= 5.0);
            assert_ne!(candidate.position.driver_id, driver(4));
        }
    }

    #[test]
    fn zero_radius_only_matches_the_exact_point() {
        let index = SpatialIndex::new(6);
        index.update(driver(1), 37.7749, -122.4194);
        index.update(driver(2), 37.7750, -122.4194);

        let nearby = index.find_nearby(37.7749, -122.4194, 0.0);
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].position.driver_id, driver(1));
        assert_eq!(nearby[0].distance_km, 0.0);
    }

    #[test]
    fn a_large_radius_is_still_bounded_by_the_cell_block() {
        let index = SpatialIndex::new(6);
        index.update(driver(1), 37.7749, -122.4194);
        // ~11 km north: well inside the radius but outside the 3x3 block of
        // ~1.2 km cells, so the query contract excludes it.
        index.update(driver(2), 37.8749, -122.4194);

        let nearby = index.find_nearby(37.7749, -122.4194, 500.0);
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].position.driver_id, driver(1));
    }

    #[test]
    fn drivers_in_neighbor_cells_are_found() {
        let index = SpatialIndex::new(6);
        // Two points ~1 km apart straddling cell boundaries still resolve
        // through the 9-cell block.
        index.update(driver(1), 37.7700, -122.4100);
        index.update(driver(2), 37.7790, -122.4150);

        let nearby = index.find_nearby(37.7749, -122.4194, 5.0);
        assert_eq!(nearby.len(), 2);
    }
}
