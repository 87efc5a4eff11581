use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::Algorithm;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{KeyDiscovery, KeyError, KeySet, VerificationKey};

#[derive(Debug, Clone, Copy)]
enum RefreshCause {
    Scheduled,
    Rotation,
}

/// Current verification keys, swapped atomically on refresh.
///
/// Readers clone the `Arc<KeySet>` under a short read lock, so a refresh never
/// blocks verification for longer than the pointer swap.
pub struct KeyMaterialCache {
    discovery: Arc<dyn KeyDiscovery>,
    algorithm: Algorithm,
    current: RwLock<Arc<KeySet>>,
    refresh_requested: Notify,
    last_fetch: Mutex<Instant>,
    min_refresh_gap: Duration,
}

impl std::fmt::Debug for KeyMaterialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterialCache")
            .field("algorithm", &self.algorithm)
            .field("min_refresh_gap", &self.min_refresh_gap)
            .finish_non_exhaustive()
    }
}

impl KeyMaterialCache {
    /// Initial blocking fetch. Any failure here must prevent startup.
    pub async fn load(
        discovery: Arc<dyn KeyDiscovery>,
        algorithm: Algorithm,
        min_refresh_gap: Duration,
    ) -> Result<Self, KeyError> {
        let jwks = discovery.fetch_key_set().await?;
        let key_set = KeySet::from_jwks(&jwks, algorithm, Utc::now())?;

        tracing::info!(keys = key_set.len(), ?algorithm, "verification keys loaded");

        Ok(Self {
            discovery,
            algorithm,
            current: RwLock::new(Arc::new(key_set)),
            refresh_requested: Notify::new(),
            last_fetch: Mutex::new(Instant::now()),
            min_refresh_gap,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub async fn get(&self, kid: &str) -> Option<VerificationKey> {
        self.current.read().await.find(kid).cloned()
    }

    pub async fn snapshot(&self) -> Arc<KeySet> {
        Arc::clone(&*self.current.read().await)
    }

    /// Fetch now and swap on success. On failure the previous set stays in place.
    pub async fn refresh(&self) -> Result<(), KeyError> {
        *self.last_fetch.lock().await = Instant::now();

        let jwks = self.discovery.fetch_key_set().await?;
        let key_set = KeySet::from_jwks(&jwks, self.algorithm, Utc::now())?;
        let count = key_set.len();

        *self.current.write().await = Arc::new(key_set);

        tracing::info!(keys = count, "verification keys refreshed");
        Ok(())
    }

    /// Ask the background refresher for an early fetch (possible key rotation).
    ///
    /// Returns immediately. Requests are coalesced: any number of calls before
    /// the refresher wakes produce a single fetch.
    pub fn request_refresh(&self) {
        self.refresh_requested.notify_one();
    }

    /// Start the refresh task. It runs until the returned handle is aborted.
    pub fn spawn_refresher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.refresh_logged(RefreshCause::Scheduled).await;
                    }
                    _ = cache.refresh_requested.notified() => {
                        let wait = cache.until_refresh_allowed().await;
                        if !wait.is_zero() {
                            tracing::debug!(?wait, "rotation refresh deferred");
                            tokio::time::sleep(wait).await;
                        }
                        cache.refresh_logged(RefreshCause::Rotation).await;
                    }
                }
            }
        })
    }

    async fn until_refresh_allowed(&self) -> Duration {
        let next = *self.last_fetch.lock().await + self.min_refresh_gap;
        next.saturating_duration_since(Instant::now())
    }

    async fn refresh_logged(&self, cause: RefreshCause) {
        if let Err(err) = self.refresh().await {
            tracing::error!(
                error = %err,
                ?cause,
                "verification key refresh failed, keeping previous key set"
            );
        }
    }
}
