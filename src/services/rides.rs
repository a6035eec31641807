use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo;
use crate::models::driver::DriverStatus;
use crate::models::position::GeoPoint;
use crate::models::ride::{Ride, RideStatus};
use crate::pricing::{FareBreakdown, FareCalculator};
use crate::services::notifications::{Notification, Notifier};
use crate::store::drivers::DriverStore;
use crate::store::riders::RiderStore;
use crate::store::rides::RideStore;

/// What the rider sees before committing to a ride.
#[derive(Debug, Clone, Serialize)]
pub struct FareEstimate {
    pub ride_id: Uuid,
    pub source: GeoPoint,
    pub destination: GeoPoint,
    pub distance_km: f64,
    pub duration_mins: f64,
    pub fare: FareBreakdown,
}

/// Ride lifecycle operations: estimation, requesting, driver acceptance, and
/// driver-side status updates. Keeps the driver's availability in step with
/// the ride's state.
pub struct RideService {
    rides: Arc<RideStore>,
    riders: Arc<RiderStore>,
    drivers: Arc<DriverStore>,
    calculator: FareCalculator,
    notifier: Arc<Notifier>,
}

impl RideService {
    pub fn new(
        rides: Arc<RideStore>,
        riders: Arc<RiderStore>,
        drivers: Arc<DriverStore>,
        calculator: FareCalculator,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            rides,
            riders,
            drivers,
            calculator,
            notifier,
        }
    }

    /// Prices a trip and records a ride in `Estimate`. The rider confirms it
    /// later via [`request_ride`](Self::request_ride).
    pub fn create_fare_estimate(
        &self,
        rider_id: Uuid,
        source: GeoPoint,
        destination: GeoPoint,
    ) -> FareEstimate {
        self.riders.get_or_create(rider_id);

        let distance_km = geo::haversine_km(&source, &destination);
        let duration_mins = geo::estimate_duration_mins(distance_km);
        let fare = self.calculator.calculate(distance_km, duration_mins, 1.0);

        let ride = Ride::new(
            Uuid::new_v4(),
            rider_id,
            source,
            destination,
            fare.total_fare,
            distance_km,
            duration_mins,
        );

        let estimate = FareEstimate {
            ride_id: ride.id,
            source,
            destination,
            distance_km: fare.distance_km,
            duration_mins: fare.duration_mins,
            fare: fare.clone(),
        };

        self.rides.create(ride);
        estimate
    }

    /// The rider commits to an estimated ride. Rejected when the ride is not
    /// theirs or they already have another ride underway.
    pub fn request_ride(&self, rider_id: Uuid, ride_id: Uuid) -> Result<Ride, AppError> {
        if let Some(active) = self.rides.active_ride_for_rider(rider_id) {
            if active.id != ride_id {
                return Err(AppError::ActiveRideExists);
            }
        }

        let mut ride = self.rides.get(ride_id)?;
        if ride.rider_id != rider_id {
            return Err(AppError::NotAuthorized);
        }

        ride.transition_to(RideStatus::Requested)?;
        self.rides.update(ride.clone())?;
        Ok(ride)
    }

    pub fn get_ride(&self, ride_id: Uuid) -> Result<Ride, AppError> {
        self.rides.get(ride_id)
    }

    /// `Requested` -> `Matching`, called once per matching run before any
    /// offer goes out.
    pub fn begin_matching(&self, ride_id: Uuid) -> Result<Ride, AppError> {
        let mut ride = self.rides.get(ride_id)?;
        ride.transition_to(RideStatus::Matching)?;
        self.rides.update(ride.clone())?;
        Ok(ride)
    }

    /// Marks a ride that found no driver as `Failed`.
    pub fn fail_matching(&self, ride_id: Uuid) -> Result<Ride, AppError> {
        let mut ride = self.rides.get(ride_id)?;
        ride.transition_to(RideStatus::Failed)?;
        self.rides.update(ride.clone())?;
        Ok(ride)
    }

    /// A driver's answer to an offer. Declines leave the ride untouched —
    /// the matching run simply moves on. Acceptance assigns the driver,
    /// transitions the ride, and marks the driver `InRide`; the ride is
    /// written before the driver so this never deadlocks against a matching
    /// run holding the driver lock.
    pub fn accept_ride(&self, driver_id: Uuid, ride_id: Uuid, accept: bool) -> Result<Ride, AppError> {
        let mut ride = self.rides.get(ride_id)?;
        if !accept {
            return Ok(ride);
        }

        ride.accept(driver_id)?;
        self.rides.update(ride.clone())?;

        if let Err(err) = self.drivers.set_status(driver_id, DriverStatus::InRide) {
            debug!(%driver_id, error = %err, "accepted ride for untracked driver");
        }

        Ok(ride)
    }

    /// Driver-side lifecycle updates (pickup, trip start, completion,
    /// cancellation), with the matching rider notification and driver status
    /// side effects.
    pub fn update_ride_status(
        &self,
        driver_id: Uuid,
        ride_id: Uuid,
        new_status: RideStatus,
    ) -> Result<Ride, AppError> {
        let mut ride = self.rides.get(ride_id)?;
        if ride.driver_id != Some(driver_id) {
            return Err(AppError::NotAuthorized);
        }

        ride.transition_to(new_status)?;
        self.rides.update(ride.clone())?;

        match new_status {
            RideStatus::PickingUp | RideStatus::InProgress => {
                let _ = self.drivers.set_status(driver_id, DriverStatus::InRide);
            }
            RideStatus::Completed | RideStatus::Cancelled => {
                let _ = self.drivers.set_status(driver_id, DriverStatus::Available);
            }
            _ => {}
        }

        match new_status {
            RideStatus::PickingUp => self.notifier.notify(Notification::RiderDriverArriving {
                rider_id: ride.rider_id,
                driver_id,
                ride_id: ride.id,
            }),
            RideStatus::InProgress => self.notifier.notify(Notification::RiderTripStarted {
                rider_id: ride.rider_id,
                ride_id: ride.id,
            }),
            RideStatus::Completed => self.notifier.notify(Notification::RiderTripCompleted {
                rider_id: ride.rider_id,
                ride_id: ride.id,
                fare: ride.actual_fare.unwrap_or(ride.estimated_fare),
            }),
            _ => {}
        }

        Ok(ride)
    }

    pub fn rides_for_driver(&self, driver_id: Uuid) -> Vec<Ride> {
        self.rides.by_driver(driver_id)
    }

    pub fn rides_for_rider(&self, rider_id: Uuid) -> Vec<Ride> {
        self.rides.by_rider(rider_id)
    }

    pub fn ride_count(&self) -> usize {
        self.rides.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    fn service() -> RideService {
        let (events_tx, _unused_rx) = broadcast::channel(16);
        RideService::new(
            Arc::new(RideStore::new()),
            Arc::new(RiderStore::new()),
            Arc::new(DriverStore::new()),
            FareCalculator::new(2.50, 1.50, 0.25, 5.00),
            Arc::new(Notifier::new(events_tx)),
        )
    }

    const SOURCE: GeoPoint = GeoPoint {
        lat: 37.77,
        lon: -122.41,
    };
    const DESTINATION: GeoPoint = GeoPoint {
        lat: 37.78,
        lon: -122.40,
    };

    #[test]
    fn estimate_creates_a_priced_ride() {
        let service = service();
        let rider = Uuid::from_u128(1);

        let estimate = service.create_fare_estimate(rider, SOURCE, DESTINATION);
        assert!(estimate.distance_km > 0.0);
        assert!(estimate.fare.total_fare >= 5.00);

        let ride = service.get_ride(estimate.ride_id).unwrap();
        assert_eq!(ride.status, RideStatus::Estimate);
        assert_eq!(ride.rider_id, rider);
        assert_eq!(ride.estimated_fare, estimate.fare.total_fare);
    }

    #[test]
    fn only_the_owning_rider_may_request() {
        let service = service();
        let estimate = service.create_fare_estimate(Uuid::from_u128(1), SOURCE, DESTINATION);

        let err = service
            .request_ride(Uuid::from_u128(2), estimate.ride_id)
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized));
    }

    #[test]
    fn requesting_the_same_ride_twice_is_rejected() {
        let service = service();
        let rider = Uuid::from_u128(1);
        let estimate = service.create_fare_estimate(rider, SOURCE, DESTINATION);

        service.request_ride(rider, estimate.ride_id).unwrap();
        let err = service.request_ride(rider, estimate.ride_id).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn a_decline_leaves_the_ride_untouched() {
        let service = service();
        let rider = Uuid::from_u128(1);
        let driver = Uuid::from_u128(9);

        let estimate = service.create_fare_estimate(rider, SOURCE, DESTINATION);
        service.request_ride(rider, estimate.ride_id).unwrap();
        service.begin_matching(estimate.ride_id).unwrap();

        let ride = service.accept_ride(driver, estimate.ride_id, false).unwrap();
        assert_eq!(ride.status, RideStatus::Matching);
        assert_eq!(ride.driver_id, None);
    }

    #[test]
    fn acceptance_assigns_the_driver_and_marks_them_in_ride() {
        let service = service();
        let rider = Uuid::from_u128(1);
        let driver = Uuid::from_u128(9);
        service.drivers.get_or_create(driver);

        let estimate = service.create_fare_estimate(rider, SOURCE, DESTINATION);
        service.request_ride(rider, estimate.ride_id).unwrap();
        service.begin_matching(estimate.ride_id).unwrap();

        let ride = service.accept_ride(driver, estimate.ride_id, true).unwrap();
        assert_eq!(ride.status, RideStatus::Accepted);
        assert_eq!(ride.driver_id, Some(driver));
        assert_eq!(
            service.drivers.get(driver).unwrap().status,
            DriverStatus::InRide
        );
    }

    #[test]
    fn accepting_an_already_accepted_ride_fails() {
        let service = service();
        let rider = Uuid::from_u128(1);

        let estimate = service.create_fare_estimate(rider, SOURCE, DESTINATION);
        service.request_ride(rider, estimate.ride_id).unwrap();
        service.begin_matching(estimate.ride_id).unwrap();
        service
            .accept_ride(Uuid::from_u128(9), estimate.ride_id, true)
            .unwrap();

        let err = service
            .accept_ride(Uuid::from_u128(8), estimate.ride_id, true)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        // The losing driver must not have overwritten the assignment.
        let ride = service.get_ride(estimate.ride_id).unwrap();
        assert_eq!(ride.driver_id, Some(Uuid::from_u128(9)));
    }
}
