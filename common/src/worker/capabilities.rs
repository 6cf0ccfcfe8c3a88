// Worker model capability cache
//
// Cache-aside: reads hit the shared cache and fall back to the store on a
// miss. A periodic bulk refresh rewrites every entry; a lease on the guard
// resource keeps processes sharing the cache from refreshing together.

use crate::cache::{self, Cache, CacheExt};
use crate::config::CapabilitySettings;
use crate::errors::StorageError;
use crate::lock::DistributedLock;
use crate::models::{Requirement, WorkerModel};
use crate::shutdown::Shutdown;
use crate::store::WorkerModelStore;
use crate::telemetry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

const KEY_PREFIX: &str = "worker:modelcapabilities";

/// Lock resource guarding the bulk refresh
pub const LOADER_GUARD: &str = "worker:modelcapabilities:loading";

/// Cache key of a worker model's capabilities
pub fn capabilities_key(model_id: i64) -> String {
    cache::key(&[KEY_PREFIX, &model_id.to_string()])
}

#[derive(Debug, Clone)]
pub struct CapabilityLoaderConfig {
    pub refresh_interval: Duration,
    /// Lifetime of the refresh guard if its holder never releases it
    pub guard_ttl: Duration,
}

impl Default for CapabilityLoaderConfig {
    fn default() -> Self {
        Self::from(&CapabilitySettings::default())
    }
}

impl From<&CapabilitySettings> for CapabilityLoaderConfig {
    fn from(settings: &CapabilitySettings) -> Self {
        Self {
            refresh_interval: Duration::from_secs(settings.refresh_interval_seconds),
            guard_ttl: Duration::from_secs(settings.guard_ttl_seconds),
        }
    }
}

/// Result of one bulk refresh attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Number of models written
    Refreshed(usize),
    /// Guard held by another refresh
    Skipped,
}

pub struct CapabilityCache {
    config: CapabilityLoaderConfig,
    cache: Arc<dyn Cache>,
    guard: Arc<dyn DistributedLock>,
    store: Arc<dyn WorkerModelStore>,
    shutdown: Shutdown,
}

impl CapabilityCache {
    pub fn new(
        config: CapabilityLoaderConfig,
        cache: Arc<dyn Cache>,
        guard: Arc<dyn DistributedLock>,
        store: Arc<dyn WorkerModelStore>,
    ) -> Self {
        Self {
            config,
            cache,
            guard,
            store,
            shutdown: Shutdown::new(),
        }
    }

    /// Capabilities of a worker model
    ///
    /// A cached entry is returned without touching the store. On a miss the
    /// store is read and the entry written before returning.
    #[instrument(skip(self))]
    pub async fn get_model_capabilities(
        &self,
        model_id: i64,
    ) -> Result<Vec<Requirement>, StorageError> {
        let key = capabilities_key(model_id);

        if let Some(capabilities) = self.cache.get_json::<Vec<Requirement>>(&key).await? {
            telemetry::record_capability_lookup("hit");
            return Ok(capabilities);
        }

        telemetry::record_capability_lookup("miss");
        let capabilities = self.store.load_worker_model_capabilities(model_id).await?;
        self.cache.set_json(&key, &capabilities).await?;

        debug!(count = capabilities.len(), "Capabilities loaded on cache miss");
        Ok(capabilities)
    }

    /// Drop one model's entry; the next read reloads it
    #[instrument(skip(self))]
    pub async fn invalidate_model_capabilities(&self, model_id: i64) -> Result<(), StorageError> {
        self.cache.delete(&capabilities_key(model_id)).await
    }

    /// Rewrite every model's entry unless another refresh holds the guard
    ///
    /// The guard is released after the attempt whether it succeeded or not.
    #[instrument(skip(self))]
    pub async fn refresh_once(&self) -> Result<RefreshOutcome, StorageError> {
        let Some(lease) = self
            .guard
            .try_acquire(LOADER_GUARD, self.config.guard_ttl)
            .await?
        else {
            debug!("Capability refresh already in progress, skipping");
            telemetry::record_capability_refresh("skipped");
            return Ok(RefreshOutcome::Skipped);
        };

        let result = self.write_all().await;

        match self.guard.release(lease).await {
            Ok(true) => {}
            Ok(false) => warn!("Capability refresh guard expired before release"),
            Err(e) => warn!(error = %e, "Unable to release capability refresh guard"),
        }

        let outcome = if result.is_ok() { "refreshed" } else { "failed" };
        telemetry::record_capability_refresh(outcome);

        result.map(RefreshOutcome::Refreshed)
    }

    async fn write_all(&self) -> Result<usize, StorageError> {
        let models: Vec<WorkerModel> = self.store.load_worker_models().await?;
        for model in &models {
            self.cache
                .set_json(&capabilities_key(model.id), &model.capabilities)
                .await?;
        }
        debug!(models = models.len(), "Capability cache refreshed");
        Ok(models.len())
    }

    /// Start the refresh loop; returns once `stop` is called
    pub async fn start(&self) {
        let Some(mut shutdown_rx) = self.shutdown.subscribe() else {
            return;
        };

        info!(
            refresh_interval_seconds = self.config.refresh_interval.as_secs(),
            "Starting capability cache loader"
        );

        let mut ticker = interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_once().await {
                        warn!(error = %e, "Unable to refresh capability cache");
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        info!("Capability cache loader stopped");
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}
