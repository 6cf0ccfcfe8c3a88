// Cron scheduler loop and its health status

pub mod engine;
pub mod status;

pub use engine::{next, CronScheduler, SchedulerConfig, TickReport};
pub use status::{SchedulerStatus, STATUS_NOT_RUNNING, STATUS_OK};
