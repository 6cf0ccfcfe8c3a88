// Cron scheduler: advances every enabled schedule by at most one execution
// per tick, under a cross-instance lock

use super::status::SchedulerStatus;
use crate::config::SchedulerSettings;
use crate::errors::{ScheduleError, TickError};
use crate::models::{Schedule, ScheduledExecution};
use crate::schedule;
use crate::shutdown::Shutdown;
use crate::store::{ScheduleStore, ScheduleTransaction};
use crate::telemetry;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay between two ticks
    pub tick_interval: Duration,
    /// Name of the exclusive lock taken by each tick
    pub lock_resource: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerSettings::default())
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            tick_interval: Duration::from_secs(settings.tick_interval_seconds),
            lock_resource: settings.lock_resource.clone(),
        }
    }
}

/// What one tick did
#[derive(Debug, Default)]
pub struct TickReport {
    /// False when another instance held the lock; nothing was done
    pub lock_acquired: bool,
    /// Executions committed by this tick
    pub executions: Vec<ScheduledExecution>,
}

/// Main scheduler implementation
pub struct CronScheduler {
    config: SchedulerConfig,
    store: Arc<dyn ScheduleStore>,
    status: SchedulerStatus,
    shutdown: Shutdown,
}

impl CronScheduler {
    pub fn new(config: SchedulerConfig, store: Arc<dyn ScheduleStore>) -> Self {
        Self {
            config,
            store,
            status: SchedulerStatus::new(),
            shutdown: Shutdown::new(),
        }
    }

    /// Handle on the health status; stays valid after the scheduler is dropped
    pub fn status(&self) -> SchedulerStatus {
        self.status.clone()
    }

    /// Run one tick now
    pub async fn run(&self) -> Result<TickReport, TickError> {
        self.run_at(Utc::now()).await
    }

    /// Run one tick as if the current time were `now`
    ///
    /// Contention on the lock is a clean, empty tick. Any persistence
    /// failure rolls back everything the tick inserted.
    #[instrument(skip(self), fields(lock = %self.config.lock_resource))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<TickReport, TickError> {
        let result = self.tick(now).await;

        match &result {
            Ok(report) if !report.lock_acquired => {
                debug!("Scheduling lock held elsewhere, skipping tick");
                telemetry::record_scheduler_tick("skipped");
                self.status.set_ok();
            }
            Ok(report) => {
                if !report.executions.is_empty() {
                    info!(
                        executions = report.executions.len(),
                        "Scheduled executions committed"
                    );
                }
                telemetry::record_scheduler_tick("ok");
                telemetry::record_executions_created(report.executions.len());
                self.status.set_ok();
            }
            Err(e) => {
                error!(error = %e, "Scheduler tick failed");
                telemetry::record_scheduler_tick("failed");
                self.status.set(e.status());
            }
        }

        result
    }

    async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, TickError> {
        let mut tx = self.store.begin().await.map_err(TickError::Begin)?;

        let acquired = match tx.try_lock(&self.config.lock_resource).await {
            Ok(acquired) => acquired,
            Err(e) => {
                rollback(tx).await;
                return Err(TickError::Lock(e));
            }
        };

        if !acquired {
            rollback(tx).await;
            return Ok(TickReport::default());
        }

        match advance_schedules(tx.as_mut(), now).await {
            Ok(executions) => {
                tx.commit().await.map_err(TickError::Commit)?;
                Ok(TickReport {
                    lock_acquired: true,
                    executions,
                })
            }
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    /// Start the tick loop; returns once `stop` is called
    pub async fn start(&self) {
        let Some(mut shutdown_rx) = self.shutdown.subscribe() else {
            return;
        };

        info!(
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            "Starting cron scheduler"
        );

        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are already logged and reflected in the status
                    let _ = self.run().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping cron scheduler");
                    break;
                }
            }
        }

        info!("Cron scheduler stopped");
    }

    /// Stop the tick loop after the in-flight tick, if any
    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

async fn rollback(tx: Box<dyn ScheduleTransaction>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Failed to roll back scheduling transaction");
    }
}

/// Compute and insert the next execution of every enabled schedule
async fn advance_schedules(
    tx: &mut dyn ScheduleTransaction,
    now: DateTime<Utc>,
) -> Result<Vec<ScheduledExecution>, TickError> {
    let schedules = tx.load_schedules().await.map_err(TickError::LoadSchedules)?;

    let mut executions = Vec::new();
    for schedule in schedules.iter().filter(|s| !s.disabled) {
        let mut execution = match next(tx, schedule, now).await {
            Ok(execution) => execution,
            Err(ScheduleError::Storage(source)) => {
                return Err(TickError::LoadExecution {
                    schedule_id: schedule.id,
                    source,
                });
            }
            Err(e @ ScheduleError::PendingExecution { .. }) => {
                debug!(schedule_id = schedule.id, reason = %e, "Schedule skipped");
                continue;
            }
            Err(e) => {
                warn!(schedule_id = schedule.id, error = %e, "Schedule skipped");
                continue;
            }
        };

        tx.insert_execution(&mut execution)
            .await
            .map_err(|source| TickError::InsertExecution {
                schedule_id: schedule.id,
                source,
            })?;

        debug!(
            schedule_id = schedule.id,
            execution_id = execution.id,
            planned_at = %execution.planned_at,
            "Execution planned"
        );
        executions.push(execution);
    }

    Ok(executions)
}

/// Compute the next execution of `schedule`
///
/// A schedule that never ran is seeded with an executed marker at `now`, so
/// its first firing is the first cron-aligned instant after `now`. A
/// schedule whose last execution has not run yet gets nothing.
#[instrument(skip(tx, schedule), fields(schedule_id = schedule.id, crontab = %schedule.crontab))]
pub async fn next(
    tx: &mut dyn ScheduleTransaction,
    schedule: &Schedule,
    now: DateTime<Utc>,
) -> Result<ScheduledExecution, ScheduleError> {
    let cron = schedule::parse_cron_expression(&schedule.crontab)?;
    let timezone = schedule::parse_timezone(&schedule.timezone)?;

    let last = match tx.load_last_execution(schedule.id).await? {
        Some(last) => last,
        None => ScheduledExecution {
            executed: true,
            executed_at: Some(now),
            ..ScheduledExecution::planned(schedule.id, now)
        },
    };

    if !last.executed {
        return Err(ScheduleError::PendingExecution {
            schedule_id: schedule.id,
            execution_id: last.id,
        });
    }

    let planned_at = schedule::next_fire_time(&cron, timezone, last.reference_time())
        .ok_or_else(|| ScheduleError::NoNextExecution(schedule.crontab.clone()))?;

    Ok(ScheduledExecution::planned(schedule.id, planned_at))
}
