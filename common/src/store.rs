// Persistent store seams consumed by the scheduler, the invoker and the
// capability cache. PostgreSQL implementations live in `db::repositories`.

use crate::errors::StorageError;
use crate::models::{Listener, Project, Requirement, Schedule, ScheduledExecution, WorkerModel};
use async_trait::async_trait;

/// Entry point for scheduling transactions
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Open a transaction; nothing done through it is visible until commit
    async fn begin(&self) -> Result<Box<dyn ScheduleTransaction>, StorageError>;
}

/// One scheduler tick's unit of work
///
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait ScheduleTransaction: Send {
    /// Try to take the named exclusive lock for the rest of the transaction.
    /// Never waits: `Ok(false)` means another instance holds it.
    async fn try_lock(&mut self, resource: &str) -> Result<bool, StorageError>;

    /// All schedules, enabled or not, in no particular order
    async fn load_schedules(&mut self) -> Result<Vec<Schedule>, StorageError>;

    /// Latest execution of a schedule, if any
    async fn load_last_execution(
        &mut self,
        schedule_id: i64,
    ) -> Result<Option<ScheduledExecution>, StorageError>;

    /// Insert an execution; the store assigns `execution.id`
    async fn insert_execution(&mut self, execution: &mut ScheduledExecution)
        -> Result<(), StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

/// Worker model capabilities as stored
#[async_trait]
pub trait WorkerModelStore: Send + Sync {
    async fn load_worker_models(&self) -> Result<Vec<WorkerModel>, StorageError>;

    async fn load_worker_model_capabilities(
        &self,
        model_id: i64,
    ) -> Result<Vec<Requirement>, StorageError>;
}

/// Resolves listener configuration by its reference
#[async_trait]
pub trait ListenerResolver: Send + Sync {
    async fn resolve_listener(&self, reference: &str) -> Result<Option<Listener>, StorageError>;
}

/// Resolves the project owning an application
#[async_trait]
pub trait ProjectResolver: Send + Sync {
    async fn load_project(&self, key: &str) -> Result<Option<Project>, StorageError>;
}

/// Cheap probe telling whether the persistent store can serve requests
#[async_trait]
pub trait StoreAvailability: Send + Sync {
    async fn is_available(&self) -> bool;
}
