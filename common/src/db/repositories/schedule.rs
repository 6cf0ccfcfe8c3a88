// Schedule repository implementation: pipeline schedules and their executions

use super::queries::{execution_queries, schedule_queries};
use crate::db::DbPool;
use crate::errors::{DatabaseError, StorageError};
use crate::models::{Schedule, ScheduledExecution};
use crate::store::{ScheduleStore, ScheduleTransaction};
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::instrument;

/// Repository for schedule-related database operations
pub struct ScheduleRepository {
    pool: DbPool,
}

impl ScheduleRepository {
    /// Create a new ScheduleRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleStore for ScheduleRepository {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn ScheduleTransaction>, StorageError> {
        let tx = self.pool.pool().begin().await?;
        Ok(Box::new(PgScheduleTransaction { tx }))
    }
}

/// Scheduling transaction over a PostgreSQL connection
///
/// The exclusive lock is a transaction-scoped advisory lock keyed by the
/// hashed resource name, released by commit or rollback.
pub struct PgScheduleTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ScheduleTransaction for PgScheduleTransaction {
    #[instrument(skip(self))]
    async fn try_lock(&mut self, resource: &str) -> Result<bool, StorageError> {
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock(hashtext($1))")
            .bind(resource)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(acquired)
    }

    #[instrument(skip(self))]
    async fn load_schedules(&mut self) -> Result<Vec<Schedule>, StorageError> {
        let query = format!(
            "SELECT {} FROM pipeline_scheduler",
            schedule_queries::SELECT_ALL_COLUMNS
        );

        let schedules = sqlx::query_as::<_, Schedule>(&query)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DatabaseError::from)?;

        tracing::debug!(count = schedules.len(), "Loaded schedules");
        Ok(schedules)
    }

    #[instrument(skip(self))]
    async fn load_last_execution(
        &mut self,
        schedule_id: i64,
    ) -> Result<Option<ScheduledExecution>, StorageError> {
        let query = format!(
            r#"
            SELECT {}
            FROM pipeline_scheduler_execution
            WHERE pipeline_scheduler_id = $1
            ORDER BY execution_planned_date DESC
            LIMIT 1
            "#,
            execution_queries::SELECT_ALL_COLUMNS
        );

        let execution = sqlx::query_as::<_, ScheduledExecution>(&query)
            .bind(schedule_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DatabaseError::from)?;

        Ok(execution)
    }

    #[instrument(skip(self, execution), fields(schedule_id = execution.schedule_id))]
    async fn insert_execution(
        &mut self,
        execution: &mut ScheduledExecution,
    ) -> Result<(), StorageError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO pipeline_scheduler_execution (
                pipeline_scheduler_id, execution_planned_date,
                execution_date, executed, pipeline_build_version
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(execution.schedule_id)
        .bind(execution.planned_at)
        .bind(execution.executed_at)
        .bind(execution.executed)
        .bind(execution.build_version)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DatabaseError::from)?;

        execution.id = id;

        tracing::debug!(
            execution_id = id,
            planned_at = %execution.planned_at,
            "Execution inserted"
        );
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Commit failed: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        let this = *self;
        this.tx
            .rollback()
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Rollback failed: {}", e)))
    }
}
