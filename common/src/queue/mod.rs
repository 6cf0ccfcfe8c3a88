// Queue module: pipeline run dispatch over NATS JetStream

pub mod nats;
pub mod publisher;

pub use nats::NatsClient;
pub use publisher::{NatsPipelineRunner, PipelineRunner, RunMessage};
