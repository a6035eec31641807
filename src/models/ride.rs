use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::position::GeoPoint;

/// Lifecycle state of a ride:
///
/// ```text
/// Estimate -> Requested -> Matching -> Accepted -> PickingUp -> InProgress -> Completed
///                              \-> Failed
///      (any non-terminal state may also move to Cancelled)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RideStatus {
    Estimate,
    Requested,
    Matching,
    Accepted,
    PickingUp,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl RideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::Cancelled | RideStatus::Failed
        )
    }

    /// The transition table. Everything not listed here is rejected.
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        use RideStatus::*;
        matches!(
            (self, next),
            (Estimate, Requested | Cancelled)
                | (Requested, Matching | Cancelled)
                | (Matching, Accepted | Failed | Cancelled)
                | (Accepted, PickingUp | Cancelled)
                | (PickingUp, InProgress | Cancelled)
                | (InProgress, Completed | Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: RideStatus,
    pub source: GeoPoint,
    pub destination: GeoPoint,
    pub estimated_fare: f64,
    pub actual_fare: Option<f64>,
    pub distance_km: f64,
    pub duration_mins: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Ride {
    /// A ride starts in `Estimate`, with no driver assigned.
    pub fn new(
        id: Uuid,
        rider_id: Uuid,
        source: GeoPoint,
        destination: GeoPoint,
        estimated_fare: f64,
        distance_km: f64,
        duration_mins: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            rider_id,
            driver_id: None,
            status: RideStatus::Estimate,
            source,
            destination,
            estimated_fare,
            actual_fare: None,
            distance_km,
            duration_mins,
            created_at: now,
            updated_at: now,
            accepted_at: None,
            picked_up_at: None,
            completed_at: None,
        }
    }

    /// Moves the ride to `next` if the transition table allows it, recording
    /// milestone timestamps along the way. Completion copies the estimate
    /// into `actual_fare` until measured fares exist.
    pub fn transition_to(&mut self, next: RideStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();

        match next {
            RideStatus::Accepted => self.accepted_at = Some(Utc::now()),
            RideStatus::PickingUp => self.picked_up_at = Some(Utc::now()),
            RideStatus::Completed => {
                self.completed_at = Some(Utc::now());
                self.actual_fare = Some(self.estimated_fare);
            }
            _ => {}
        }

        Ok(())
    }

    pub fn assign_driver(&mut self, driver_id: Uuid) {
        self.driver_id = Some(driver_id);
        self.updated_at = Utc::now();
    }

    /// The composite acceptance step: assign the driver, then transition to
    /// `Accepted`. Callers roll back by discarding the modified copy on error.
    pub fn accept(&mut self, driver_id: Uuid) -> Result<(), AppError> {
        self.assign_driver(driver_id);
        self.transition_to(RideStatus::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ride() -> Ride {
        Ride::new(
            Uuid::from_u128(1),
            Uuid::from_u128(2),
            GeoPoint { lat: 37.77, lon: -122.41 },
            GeoPoint { lat: 37.78, lon: -122.40 },
            12.50,
            3.2,
            6.4,
        )
    }

    #[test]
    fn happy_path_walks_the_full_lifecycle() {
        let mut r = ride();
        r.transition_to(RideStatus::Requested).unwrap();
        r.transition_to(RideStatus::Matching).unwrap();
        r.accept(Uuid::from_u128(9)).unwrap();
        r.transition_to(RideStatus::PickingUp).unwrap();
        r.transition_to(RideStatus::InProgress).unwrap();
        r.transition_to(RideStatus::Completed).unwrap();

        assert_eq!(r.status, RideStatus::Completed);
        assert_eq!(r.driver_id, Some(Uuid::from_u128(9)));
        assert!(r.accepted_at.is_some());
        assert!(r.picked_up_at.is_some());
        assert!(r.completed_at.is_some());
        assert_eq!(r.actual_fare, Some(r.estimated_fare));
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut r = ride();
        let err = r.transition_to(RideStatus::InProgress).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(r.status, RideStatus::Estimate);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let mut r = ride();
        r.transition_to(RideStatus::Cancelled).unwrap();
        assert!(r.transition_to(RideStatus::Requested).is_err());
        assert!(r.transition_to(RideStatus::Cancelled).is_err());
    }

    #[test]
    fn any_non_terminal_state_can_cancel() {
        for setup in [
            vec![],
            vec![RideStatus::Requested],
            vec![RideStatus::Requested, RideStatus::Matching],
        ] {
            let mut r = ride();
            for status in setup {
                r.transition_to(status).unwrap();
            }
            assert!(r.transition_to(RideStatus::Cancelled).is_ok());
        }
    }

    #[test]
    fn matching_may_fail() {
        let mut r = ride();
        r.transition_to(RideStatus::Requested).unwrap();
        r.transition_to(RideStatus::Matching).unwrap();
        r.transition_to(RideStatus::Failed).unwrap();
        assert!(r.status.is_terminal());
    }
}
