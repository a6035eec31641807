use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Keyed mutual exclusion with time-to-live expiry. The matching engine uses
/// it to ensure a driver is only ever offered one ride at a time; the TTL
/// frees locks whose holder never released them.
///
/// Locks are not ownership-tagged — anyone may release any key. That only
/// holds up in a single-instance deployment; a multi-instance future would
/// swap this for Redis SETNX or an etcd lease behind the same interface.
pub struct LockManager {
    locks: Arc<Mutex<HashMap<String, Instant>>>,
    shutdown: CancellationToken,
}

impl LockManager {
    /// Creates the manager and spawns its background sweeper, which drops
    /// expired entries at `sweep_interval`. Must be called from within a
    /// tokio runtime.
    pub fn new(sweep_interval: Duration) -> Self {
        let locks = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        let sweeper_locks = Arc::clone(&locks);
        let sweeper_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = sweeper_shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let mut table = sweeper_locks.lock().unwrap_or_else(|e| e.into_inner());
                        let before = table.len();
                        table.retain(|_, expires_at| *expires_at > now);
                        let swept = before - table.len();
                        if swept > 0 {
                            debug!(swept, "dropped expired locks");
                        }
                    }
                }
            }
        });

        Self { locks, shutdown }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Takes the lock if it is free or its previous holder's TTL has lapsed.
    /// Returns false while another holder's entry is still live.
    pub fn acquire(&self, key: &str, ttl: Duration) -> bool {
        let mut table = self.table();
        let now = Instant::now();

        if let Some(expires_at) = table.get(key) {
            if *expires_at > now {
                return false;
            }
        }

        table.insert(key.to_string(), now + ttl);
        true
    }

    /// Releases a key ahead of its TTL. Absent keys are a no-op.
    pub fn release(&self, key: &str) {
        self.table().remove(key);
    }

    pub fn is_locked(&self, key: &str) -> bool {
        match self.table().get(key) {
            Some(expires_at) => *expires_at > Instant::now(),
            None => false,
        }
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
