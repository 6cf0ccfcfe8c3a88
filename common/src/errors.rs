// Error handling framework for the trigger and scheduling core

use thiserror::Error;

/// Schedule-related errors
///
/// All of these are local to one schedule: the tick skips the schedule and
/// retries it on the next tick.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Last execution {execution_id} of schedule {schedule_id} not ran")]
    PendingExecution { schedule_id: i64, execution_id: i64 },

    #[error("No next execution time available for expression '{0}'")]
    NoNextExecution(String),

    #[error("Failed to load last execution: {0}")]
    Storage(#[from] StorageError),
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),
}

/// Storage errors, shared by the relational store and the cache
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Redis error: {0}")]
    RedisError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Transaction-level failures of a scheduler tick
///
/// Any of these rolls back the whole tick. Contended locks are not errors.
#[derive(Error, Debug)]
pub enum TickError {
    #[error("Unable to start a transaction: {0}")]
    Begin(#[source] StorageError),

    #[error("Unable to acquire scheduling lock: {0}")]
    Lock(#[source] StorageError),

    #[error("Unable to load schedules: {0}")]
    LoadSchedules(#[source] StorageError),

    #[error("Unable to load last execution of schedule {schedule_id}: {source}")]
    LoadExecution {
        schedule_id: i64,
        #[source]
        source: StorageError,
    },

    #[error("Unable to insert an execution for schedule {schedule_id}: {source}")]
    InsertExecution {
        schedule_id: i64,
        #[source]
        source: StorageError,
    },

    #[error("Unable to commit a transaction: {0}")]
    Commit(#[source] StorageError),
}

impl TickError {
    /// Short diagnostic published through the scheduler status
    pub fn status(&self) -> &'static str {
        match self {
            TickError::Begin(_) => "Run> Unable to start a transaction",
            TickError::Lock(_) => "Run> Unable to acquire scheduling lock",
            TickError::LoadSchedules(_) => "Run> Unable to load schedules",
            TickError::LoadExecution { .. } => "Run> Unable to load last execution",
            TickError::InsertExecution { .. } => "Run> Unable to insert an execution",
            TickError::Commit(_) => "Run> Unable to commit a transaction",
        }
    }
}

/// Trigger event processing errors
///
/// Every variant is terminal for the event being processed: the event is
/// logged and dropped, never re-queued.
#[derive(Error, Debug)]
pub enum InvokerError {
    #[error("Invalid trigger event: empty listener reference")]
    InvalidEvent,

    #[error("Listener not found: {0}")]
    ListenerNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Undecodable trigger event: {0}")]
    Payload(String),

    #[error("Pipeline dispatch failed: {0}")]
    Dispatch(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Queue-related errors
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to connect to queue: {0}")]
    Connection(String),

    #[error("Failed to create stream: {0}")]
    StreamCreation(String),

    #[error("Failed to publish message: {0}")]
    PublishFailed(String),

    #[error("Message serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Queue operation timeout: {0}")]
    Timeout(String),
}

impl From<QueueError> for InvokerError {
    fn from(err: QueueError) -> Self {
        InvokerError::Dispatch(err.to_string())
    }
}

// Implement From for common external errors
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                // Check for specific database error codes
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateKey(db_err.message().to_string()),
                        "23503" => DatabaseError::ForeignKeyViolation(db_err.message().to_string()),
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DatabaseError::ConnectionFailed(err.to_string())
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Unavailable(err.to_string())
            }
            _ => StorageError::DatabaseError(err.to_string()),
        }
    }
}

impl From<DatabaseError> for StorageError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConnectionFailed(msg) => StorageError::Unavailable(msg),
            other => StorageError::DatabaseError(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::RedisError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
