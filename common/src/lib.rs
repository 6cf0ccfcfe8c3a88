// Trigger-and-scheduling core shared by the engine binary and its tests

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod invoker;
pub mod lock;
pub mod models;
pub mod queue;
pub mod schedule;
pub mod scheduler;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod worker;
