use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::models::position::GeoPoint;

/// Events pushed to riders and drivers. In production these would go out
/// through FCM/APNs; here each event is logged and fanned out on a broadcast
/// channel that the websocket endpoint streams. Delivery is best-effort and
/// at-least-once — deduplication is the transport's problem.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum Notification {
    DriverOfferReceived {
        driver_id: Uuid,
        ride_id: Uuid,
        source: GeoPoint,
        destination: GeoPoint,
        estimated_fare: f64,
    },
    DriverOfferTimedOut {
        driver_id: Uuid,
        ride_id: Uuid,
    },
    RiderDriverAccepted {
        rider_id: Uuid,
        driver_id: Uuid,
        ride_id: Uuid,
    },
    RiderDriverArriving {
        rider_id: Uuid,
        driver_id: Uuid,
        ride_id: Uuid,
    },
    RiderTripStarted {
        rider_id: Uuid,
        ride_id: Uuid,
    },
    RiderTripCompleted {
        rider_id: Uuid,
        ride_id: Uuid,
        fare: f64,
    },
    RiderNoDriversAvailable {
        rider_id: Uuid,
        ride_id: Uuid,
    },
}

pub struct Notifier {
    events_tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(events_tx: broadcast::Sender<Notification>) -> Self {
        Self { events_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events_tx.subscribe()
    }

    /// Logs the event and hands it to any connected stream. Having no
    /// listeners is not an error.
    pub fn notify(&self, notification: Notification) {
        match &notification {
            Notification::DriverOfferReceived {
                driver_id,
                ride_id,
                estimated_fare,
                ..
            } => info!(%driver_id, %ride_id, fare = estimated_fare, "notify driver: ride offer"),
            Notification::DriverOfferTimedOut { driver_id, ride_id } => {
                info!(%driver_id, %ride_id, "notify driver: offer expired")
            }
            Notification::RiderDriverAccepted {
                rider_id,
                driver_id,
                ride_id,
            } => info!(%rider_id, %driver_id, %ride_id, "notify rider: driver accepted"),
            Notification::RiderDriverArriving {
                rider_id,
                driver_id,
                ride_id,
            } => info!(%rider_id, %driver_id, %ride_id, "notify rider: driver arriving"),
            Notification::RiderTripStarted { rider_id, ride_id } => {
                info!(%rider_id, %ride_id, "notify rider: trip started")
            }
            Notification::RiderTripCompleted {
                rider_id,
                ride_id,
                fare,
            } => info!(%rider_id, %ride_id, fare, "notify rider: trip completed"),
            Notification::RiderNoDriversAvailable { rider_id, ride_id } => {
                info!(%rider_id, %ride_id, "notify rider: no drivers available")
            }
        }

        let _ = self.events_tx.send(notification);
    }
}
