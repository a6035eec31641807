use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{Driver, DriverStatus};

/// Keyed driver store. Per-entry locking is enough here — nothing scans
/// drivers across keys.
#[derive(Default)]
pub struct DriverStore {
    drivers: DashMap<Uuid, Driver>,
}

impl DriverStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, driver: Driver) {
        self.drivers.insert(driver.id, driver);
    }

    pub fn get(&self, id: Uuid) -> Result<Driver, AppError> {
        self.drivers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(AppError::DriverNotFound(id))
    }

    /// Returns the driver, creating a provisional record on first contact.
    pub fn get_or_create(&self, id: Uuid) -> Driver {
        self.drivers
            .entry(id)
            .or_insert_with(|| Driver::provisional(id))
            .value()
            .clone()
    }

    pub fn update(&self, driver: Driver) -> Result<(), AppError> {
        match self.drivers.get_mut(&driver.id) {
            Some(mut entry) => {
                *entry.value_mut() = driver;
                Ok(())
            }
            None => Err(AppError::DriverNotFound(driver.id)),
        }
    }

    pub fn set_status(&self, id: Uuid, status: DriverStatus) -> Result<(), AppError> {
        match self.drivers.get_mut(&id) {
            Some(mut entry) => {
                entry.value_mut().set_status(status);
                Ok(())
            }
            None => Err(AppError::DriverNotFound(id)),
        }
    }
}
