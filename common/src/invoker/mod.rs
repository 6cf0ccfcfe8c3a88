// Trigger invoker: turns queued trigger events into pipeline runs

pub mod consumer;
pub mod params;

pub use consumer::{InvokerConfig, InvokerDeps, PollOutcome, TriggerInvoker};
pub use params::{extract_vcs_changes, flatten_payload};
