//! The per-ride matching coordinator.
//!
//! `start_matching` spawns one run per ride. A run moves the ride into
//! `Matching`, queries the spatial index for available drivers sorted by
//! distance, and offers the ride to one candidate at a time under a
//! `driver:<id>` lock, waiting on each offer until the driver answers, the
//! per-offer timer fires, the overall deadline fires, or the caller cancels.
//! Driver answers arrive out-of-band through `submit_driver_response` and are
//! routed to the waiting run by ride id.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::locks::LockManager;
use crate::error::AppError;
use crate::models::ride::Ride;
use crate::observability::metrics::Metrics;
use crate::services::locations::LocationService;
use crate::services::notifications::{Notification, Notifier};
use crate::services::rides::RideService;
use crate::store::drivers::DriverStore;

/// A driver's answer to a ride offer, routed by ride id.
#[derive(Debug, Clone, Copy)]
pub struct DriverResponse {
    pub driver_id: Uuid,
    pub ride_id: Uuid,
    pub accept: bool,
}

/// The single outcome of a matching run: the accepted driver's id, or why
/// the run ended without one.
pub type MatchResult = Result<Uuid, AppError>;

#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub search_radius_km: f64,
    pub driver_response_timeout: Duration,
    pub total_matching_timeout: Duration,
}

impl From<&Config> for MatchingConfig {
    fn from(config: &Config) -> Self {
        Self {
            search_radius_km: config.search_radius_km,
            driver_response_timeout: config.driver_response_timeout,
            total_matching_timeout: config.total_matching_timeout,
        }
    }
}

/// Capacity of each run's response rendezvous. Responses beyond it are
/// dropped by the router — a driver answering a ride that has moved on has
/// no effect.
const RENDEZVOUS_CAPACITY: usize = 10;

pub struct MatchingEngine {
    config: MatchingConfig,
    rides: Arc<RideService>,
    locations: Arc<LocationService>,
    drivers: Arc<DriverStore>,
    locks: Arc<LockManager>,
    notifier: Arc<Notifier>,
    metrics: Metrics,

    /// Shared inbox for all driver answers; drained by the router task.
    response_tx: mpsc::Sender<DriverResponse>,

    /// ride id -> that run's rendezvous, registered only while the run is
    /// live.
    pending: DashMap<Uuid, mpsc::Sender<DriverResponse>>,

    shutdown: CancellationToken,
}

impl MatchingEngine {
    /// Creates the engine and spawns its response-router task. Must be
    /// called from within a tokio runtime.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: MatchingConfig,
        rides: Arc<RideService>,
        locations: Arc<LocationService>,
        drivers: Arc<DriverStore>,
        locks: Arc<LockManager>,
        notifier: Arc<Notifier>,
        metrics: Metrics,
        response_inbox_size: usize,
    ) -> Arc<Self> {
        let (response_tx, response_rx) = mpsc::channel(response_inbox_size);

        let engine = Arc::new(Self {
            config,
            rides,
            locations,
            drivers,
            locks,
            notifier,
            metrics,
            response_tx,
            pending: DashMap::new(),
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(Arc::clone(&engine).route_responses(response_rx));

        engine
    }

    /// Stops the response router. Runs already in flight finish on their own
    /// deadlines.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Begins matching for `ride`. The returned channel delivers exactly one
    /// [`MatchResult`] and is then closed. `cancel` aborts the run at its
    /// next suspension point; a cancelled run releases any held driver lock
    /// but leaves the ride in `Matching`.
    pub fn start_matching(
        self: Arc<Self>,
        ride: Ride,
        cancel: CancellationToken,
    ) -> oneshot::Receiver<MatchResult> {
        let (result_tx, result_rx) = oneshot::channel();
        tokio::spawn(self.run(ride, cancel, result_tx));
        result_rx
    }

    /// Fire-and-forget ingress for driver answers. An answer for a ride with
    /// no live matching run is silently dropped.
    pub async fn submit_driver_response(&self, driver_id: Uuid, ride_id: Uuid, accept: bool) {
        let response = DriverResponse {
            driver_id,
            ride_id,
            accept,
        };
        if self.response_tx.send(response).await.is_err() {
            warn!(%ride_id, "response inbox closed; dropping driver response");
        }
    }

    /// Long-running router: forwards each inbox answer to the rendezvous
    /// registered for its ride. A full rendezvous drops the answer rather
    /// than blocking the router.
    async fn route_responses(self: Arc<Self>, mut inbox: mpsc::Receiver<DriverResponse>) {
        loop {
            let response = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = inbox.recv() => match received {
                    Some(response) => response,
                    None => break,
                },
            };

            let Some(rendezvous) = self.pending.get(&response.ride_id) else {
                debug!(ride_id = %response.ride_id, "no matching run for response; ignoring");
                continue;
            };

            if let Err(mpsc::error::TrySendError::Full(_)) = rendezvous.try_send(response) {
                warn!(ride_id = %response.ride_id, "rendezvous full; dropping driver response");
            }
        }
    }

    async fn run(
        self: Arc<Self>,
        ride: Ride,
        cancel: CancellationToken,
        result_tx: oneshot::Sender<MatchResult>,
    ) {
        let started = std::time::Instant::now();

        let (rendezvous_tx, mut rendezvous_rx) = mpsc::channel(RENDEZVOUS_CAPACITY);
        self.pending.insert(ride.id, rendezvous_tx);

        let outcome = self.match_ride(&ride, &mut rendezvous_rx, &cancel).await;

        let label = match &outcome {
            Ok(_) => "matched",
            Err(AppError::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        self.metrics.matches_total.with_label_values(&[label]).inc();
        self.metrics
            .matching_latency_seconds
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        // The outcome is emitted before the rendezvous closes and the
        // registry entry disappears.
        let _ = result_tx.send(outcome);
        self.pending.remove(&ride.id);
    }

    async fn match_ride(
        &self,
        ride: &Ride,
        rendezvous: &mut mpsc::Receiver<DriverResponse>,
        cancel: &CancellationToken,
    ) -> MatchResult {
        self.rides.begin_matching(ride.id)?;

        let deadline = Instant::now() + self.config.total_matching_timeout;

        let candidates = self
            .locations
            .find_nearby_available(ride.source, self.config.search_radius_km);

        if candidates.is_empty() {
            info!(ride_id = %ride.id, "no drivers nearby");
            self.fail_no_drivers(ride);
            return Err(AppError::NoDriversAvailable);
        }

        info!(ride_id = %ride.id, candidates = candidates.len(), "offering ride to nearby drivers");

        for candidate in candidates {
            if Instant::now() >= deadline {
                info!(ride_id = %ride.id, "matching timed out");
                self.fail_no_drivers(ride);
                return Err(AppError::NoDriversAvailable);
            }
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let driver_id = candidate.position.driver_id;

            // Re-fetch: the driver may have been booked or gone offline since
            // the radius query.
            let Ok(driver) = self.drivers.get(driver_id) else {
                continue;
            };
            if !driver.is_available() {
                continue;
            }

            let lock_key = driver_lock_key(driver_id);
            if !self
                .locks
                .acquire(&lock_key, self.config.driver_response_timeout)
            {
                debug!(ride_id = %ride.id, %driver_id, "driver locked by another run; skipping");
                continue;
            }

            info!(
                ride_id = %ride.id,
                %driver_id,
                distance_km = candidate.distance_km,
                "offering ride"
            );
            self.metrics.offers_total.inc();
            self.notifier.notify(Notification::DriverOfferReceived {
                driver_id,
                ride_id: ride.id,
                source: ride.source,
                destination: ride.destination,
                estimated_fare: ride.estimated_fare,
            });

            let offer_deadline = tokio::time::sleep(self.config.driver_response_timeout);
            tokio::pin!(offer_deadline);

            tokio::select! {
                response = rendezvous.recv() => match response {
                    Some(answer) if answer.driver_id == driver_id && answer.accept => {
                        self.locks.release(&lock_key);
                        match self.rides.accept_ride(driver_id, ride.id, true) {
                            Ok(_) => {
                                info!(ride_id = %ride.id, %driver_id, "driver accepted");
                                self.notifier.notify(Notification::RiderDriverAccepted {
                                    rider_id: ride.rider_id,
                                    driver_id,
                                    ride_id: ride.id,
                                });
                                return Ok(driver_id);
                            }
                            Err(err) => {
                                warn!(ride_id = %ride.id, %driver_id, error = %err, "acceptance failed; trying next driver");
                                continue;
                            }
                        }
                    }
                    Some(answer) => {
                        // A decline, or a stale answer from some other driver.
                        debug!(
                            ride_id = %ride.id,
                            offered = %driver_id,
                            responded = %answer.driver_id,
                            accept = answer.accept,
                            "offer declined"
                        );
                        self.locks.release(&lock_key);
                    }
                    None => {
                        self.locks.release(&lock_key);
                        return Err(AppError::Internal("matching rendezvous closed".to_string()));
                    }
                },
                _ = &mut offer_deadline => {
                    info!(ride_id = %ride.id, %driver_id, "offer timed out");
                    self.notifier.notify(Notification::DriverOfferTimedOut {
                        driver_id,
                        ride_id: ride.id,
                    });
                    self.locks.release(&lock_key);
                },
                _ = tokio::time::sleep_until(deadline) => {
                    self.locks.release(&lock_key);
                    info!(ride_id = %ride.id, "matching timed out");
                    self.fail_no_drivers(ride);
                    return Err(AppError::NoDriversAvailable);
                },
                _ = cancel.cancelled() => {
                    self.locks.release(&lock_key);
                    return Err(AppError::Cancelled);
                },
            }
        }

        info!(ride_id = %ride.id, "no driver accepted");
        self.fail_no_drivers(ride);
        Err(AppError::NoDriversAvailable)
    }

    fn fail_no_drivers(&self, ride: &Ride) {
        if let Err(err) = self.rides.fail_matching(ride.id) {
            warn!(ride_id = %ride.id, error = %err, "could not mark ride failed");
        }
        self.notifier.notify(Notification::RiderNoDriversAvailable {
            rider_id: ride.rider_id,
            ride_id: ride.id,
        });
    }
}

pub fn driver_lock_key(driver_id: Uuid) -> String {
    format!("driver:{driver_id}")
}
