// Repository layer for database operations

pub mod listener;
pub mod queries;
pub mod schedule;
pub mod worker_model;

pub use listener::ListenerRepository;
pub use schedule::{PgScheduleTransaction, ScheduleRepository};
pub use worker_model::WorkerModelRepository;
