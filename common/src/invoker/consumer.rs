// Trigger event consumer: drains the trigger queue and dispatches pipeline runs

use super::params::{extract_vcs_changes, flatten_payload};
use crate::cache::{Cache, CacheExt};
use crate::config::InvokerSettings;
use crate::errors::InvokerError;
use crate::models::{RunRequest, TriggerEvent, TriggerProvenance};
use crate::queue::PipelineRunner;
use crate::shutdown::Shutdown;
use crate::store::{ListenerResolver, ProjectResolver, StoreAvailability};
use crate::telemetry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the trigger invoker
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    pub poll_interval: Duration,
    /// Pause taken while maintenance mode is on
    pub maintenance_backoff: Duration,
    pub queue_name: String,
    pub maintenance_key: String,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self::from(&InvokerSettings::default())
    }
}

impl From<&InvokerSettings> for InvokerConfig {
    fn from(settings: &InvokerSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            maintenance_backoff: Duration::from_secs(settings.maintenance_backoff_seconds),
            queue_name: settings.queue_name.clone(),
            maintenance_key: settings.maintenance_key.clone(),
        }
    }
}

/// Result of one poll of the trigger queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Queue was empty
    Idle,
    /// Event pushed back to the tail of the queue
    Requeued,
    /// Pipeline run accepted
    Dispatched,
    /// Event dropped after a processing error
    Failed,
}

/// Collaborators of the trigger invoker
pub struct InvokerDeps {
    pub cache: Arc<dyn Cache>,
    pub availability: Arc<dyn StoreAvailability>,
    pub listeners: Arc<dyn ListenerResolver>,
    pub projects: Arc<dyn ProjectResolver>,
    pub runner: Arc<dyn PipelineRunner>,
}

/// Trigger queue consumer
pub struct TriggerInvoker {
    config: InvokerConfig,
    deps: InvokerDeps,
    shutdown: Shutdown,
}

impl TriggerInvoker {
    pub fn new(config: InvokerConfig, deps: InvokerDeps) -> Self {
        Self {
            config,
            deps,
            shutdown: Shutdown::new(),
        }
    }

    /// Whether maintenance mode is on fleet-wide
    ///
    /// An unreadable flag counts as off.
    pub async fn maintenance_enabled(&self) -> bool {
        match self
            .deps
            .cache
            .get_json::<bool>(&self.config.maintenance_key)
            .await
        {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "Unable to read maintenance flag");
                false
            }
        }
    }

    /// Read the maintenance flag then handle at most one event, without backing off
    pub async fn poll_once(&self) -> PollOutcome {
        let maintenance = self.maintenance_enabled().await;
        self.handle_next(maintenance).await
    }

    /// Dequeue one event; re-queue it if the store is down or maintenance is on,
    /// otherwise process it
    ///
    /// Re-queued events are pushed back exactly as they were read, without
    /// decoding them.
    #[instrument(skip(self))]
    pub async fn handle_next(&self, maintenance: bool) -> PollOutcome {
        let raw = match self.deps.cache.dequeue(&self.config.queue_name).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return PollOutcome::Idle,
            Err(e) => {
                error!(error = %e, queue = %self.config.queue_name, "Unable to dequeue trigger event");
                return PollOutcome::Idle;
            }
        };

        if maintenance || !self.deps.availability.is_available().await {
            return self.requeue(&raw, maintenance).await;
        }

        match self.process_raw(&raw).await {
            Ok(()) => {
                telemetry::record_trigger_event("dispatched");
                PollOutcome::Dispatched
            }
            Err(e) => {
                error!(error = %e, "Unable to process trigger event");
                telemetry::record_trigger_event("failed");
                PollOutcome::Failed
            }
        }
    }

    async fn requeue(&self, raw: &str, maintenance: bool) -> PollOutcome {
        debug!(
            queue = %self.config.queue_name,
            maintenance,
            "Store unavailable or maintenance on, re-queueing trigger event"
        );

        if let Err(e) = self.deps.cache.enqueue(&self.config.queue_name, raw).await {
            error!(queue = %self.config.queue_name, error = %e, "Unable to re-queue trigger event");
            return PollOutcome::Failed;
        }

        telemetry::record_trigger_event_requeued();
        PollOutcome::Requeued
    }

    async fn process_raw(&self, raw: &str) -> Result<(), InvokerError> {
        let event: TriggerEvent =
            serde_json::from_str(raw).map_err(|e| InvokerError::Payload(e.to_string()))?;
        self.process_event(event).await
    }

    /// Resolve an event's context and dispatch the pipeline run
    ///
    /// Every error is terminal for the event.
    #[instrument(skip(self, event), fields(listener = %event.listener_uuid))]
    pub async fn process_event(&self, mut event: TriggerEvent) -> Result<(), InvokerError> {
        if event.listener_uuid.is_empty() {
            return Err(InvokerError::InvalidEvent);
        }
        event.received_at = Some(Utc::now());

        let listener = self
            .deps
            .listeners
            .resolve_listener(&event.listener_uuid)
            .await?
            .ok_or_else(|| InvokerError::ListenerNotFound(event.listener_uuid.clone()))?;

        let parameters = flatten_payload(&event.payload);
        let vcs = extract_vcs_changes(&parameters);

        let project_key = listener.application.project_key.clone();
        let project = self
            .deps
            .projects
            .load_project(&project_key)
            .await?
            .ok_or(InvokerError::ProjectNotFound(project_key))?;

        let request = RunRequest {
            project,
            pipeline: listener.pipeline,
            application: listener.application,
            environment: listener.environment,
            trigger: TriggerProvenance::default(),
            vcs,
            parameters,
        };

        self.deps.runner.run_pipeline(&request).await?;

        info!(
            project = %request.project.key,
            pipeline = %request.pipeline.name,
            parameters = request.parameters.len(),
            "Trigger event dispatched"
        );
        Ok(())
    }

    /// Start the poll loop; returns once `stop` is called
    pub async fn start(&self) {
        let Some(mut shutdown_rx) = self.shutdown.subscribe() else {
            return;
        };

        info!(
            queue = %self.config.queue_name,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting trigger invoker"
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.recv() => break,
            }

            let maintenance = self.maintenance_enabled().await;
            if maintenance {
                warn!(
                    backoff_seconds = self.config.maintenance_backoff.as_secs(),
                    "Maintenance mode on, trigger processing suspended"
                );
                tokio::select! {
                    _ = sleep(self.config.maintenance_backoff) => {}
                    _ = shutdown_rx.recv() => break,
                }
            }

            self.handle_next(maintenance).await;
        }

        info!("Trigger invoker stopped");
    }

    /// Stop the poll loop
    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}
