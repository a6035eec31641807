use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A passenger. Riders carry no status of their own — their state lives in
/// their active ride, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Rider {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            created_at: Utc::now(),
        }
    }

    pub fn provisional(id: Uuid) -> Self {
        Self::new(id, format!("rider-{id}"))
    }
}
