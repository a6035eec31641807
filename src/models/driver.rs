use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DriverStatus {
    Available,
    InRide,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub status: DriverStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// Drivers start `Offline`; the first location ping brings them online.
    pub fn new(id: Uuid, name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            status: DriverStatus::Offline,
            created_at: now,
            updated_at: now,
        }
    }

    /// Placeholder record for a driver first seen via a location ping.
    pub fn provisional(id: Uuid) -> Self {
        Self::new(id, format!("driver-{id}"))
    }

    pub fn is_available(&self) -> bool {
        self.status == DriverStatus::Available
    }

    pub fn set_status(&mut self, status: DriverStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn go_online(&mut self) {
        self.set_status(DriverStatus::Available);
    }

    pub fn go_offline(&mut self) {
        self.set_status(DriverStatus::Offline);
    }

    pub fn start_ride(&mut self) {
        self.set_status(DriverStatus::InRide);
    }

    pub fn end_ride(&mut self) {
        self.set_status(DriverStatus::Available);
    }
}
