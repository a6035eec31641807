use dashmap::DashMap;
use uuid::Uuid;

use crate::models::rider::Rider;

#[derive(Default)]
pub struct RiderStore {
    riders: DashMap<Uuid, Rider>,
}

impl RiderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Riders are auto-created on first contact.
    pub fn get_or_create(&self, id: Uuid) -> Rider {
        self.riders
            .entry(id)
            .or_insert_with(|| Rider::provisional(id))
            .value()
            .clone()
    }
}
