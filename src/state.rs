use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::engine::locks::LockManager;
use crate::engine::matching::{MatchingConfig, MatchingEngine};
use crate::geo::spatial::SpatialIndex;
use crate::observability::metrics::Metrics;
use crate::pricing::FareCalculator;
use crate::services::locations::LocationService;
use crate::services::notifications::Notifier;
use crate::services::rides::RideService;
use crate::store::drivers::DriverStore;
use crate::store::locations::LocationStore;
use crate::store::riders::RiderStore;
use crate::store::rides::RideStore;

pub struct AppState {
    pub config: Config,
    pub rides: Arc<RideService>,
    pub locations: Arc<LocationService>,
    pub matching: Arc<MatchingEngine>,
    pub drivers: Arc<DriverStore>,
    pub notifier: Arc<Notifier>,
    pub locks: Arc<LockManager>,
    pub metrics: Metrics,
}

impl AppState {
    /// Wires stores into services and services into the matching engine.
    /// Spawns the lock sweeper and the response router, so this must run
    /// inside a tokio runtime.
    pub fn new(config: Config) -> Self {
        let metrics = Metrics::new();
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let notifier = Arc::new(Notifier::new(events_tx));

        let ride_store = Arc::new(RideStore::new());
        let rider_store = Arc::new(RiderStore::new());
        let driver_store = Arc::new(DriverStore::new());
        let location_store = Arc::new(LocationStore::new());
        let index = Arc::new(SpatialIndex::new(config.geohash_precision));
        let locks = Arc::new(LockManager::new(config.lock_sweep_interval));

        let calculator = FareCalculator::new(
            config.base_fare,
            config.per_km_rate,
            config.per_minute_rate,
            config.minimum_fare,
        );

        let rides = Arc::new(RideService::new(
            ride_store,
            rider_store,
            Arc::clone(&driver_store),
            calculator,
            Arc::clone(&notifier),
        ));

        let locations = Arc::new(LocationService::new(
            index,
            Arc::clone(&driver_store),
            location_store,
            metrics.clone(),
        ));

        let matching = MatchingEngine::new(
            MatchingConfig::from(&config),
            Arc::clone(&rides),
            Arc::clone(&locations),
            Arc::clone(&driver_store),
            Arc::clone(&locks),
            Arc::clone(&notifier),
            metrics.clone(),
            config.response_inbox_size,
        );

        Self {
            config,
            rides,
            locations,
            matching,
            drivers: driver_store,
            notifier,
            locks,
            metrics,
        }
    }
}
