// Pipeline runner: hands run requests to the pipeline-execution engine

use crate::errors::QueueError;
use crate::models::RunRequest;
use crate::queue::nats::NatsClient;
use async_nats::jetstream::context::PublishAckFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Message format for run requests on the stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMessage {
    pub run_id: Uuid,
    pub request: RunRequest,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl From<&RunRequest> for RunMessage {
    fn from(request: &RunRequest) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            request: request.clone(),
            published_at: chrono::Utc::now(),
        }
    }
}

/// Fire-and-forget pipeline dispatch
///
/// Returns once the run is accepted, not once it completes.
#[async_trait::async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run_pipeline(&self, request: &RunRequest) -> Result<(), QueueError>;
}

/// NATS-based pipeline runner; a run is accepted when JetStream acks it
pub struct NatsPipelineRunner {
    client: NatsClient,
    publish_timeout: Duration,
}

impl NatsPipelineRunner {
    /// Create a new NATS pipeline runner
    pub fn new(client: NatsClient) -> Self {
        Self {
            client,
            publish_timeout: Duration::from_secs(5),
        }
    }

    /// Get the subject for a run request
    fn get_subject(&self, request: &RunRequest) -> String {
        subject_for(&self.client.config().subject_prefix, request)
    }
}

fn subject_for(prefix: &str, request: &RunRequest) -> String {
    format!(
        "{}.{}.{}",
        prefix,
        subject_token(&request.project.key),
        subject_token(&request.pipeline.name)
    )
}

/// Subject tokens cannot contain separators, wildcards or whitespace
fn subject_token(raw: &str) -> String {
    let token: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if token.is_empty() {
        "_".to_string()
    } else {
        token
    }
}

#[async_trait::async_trait]
impl PipelineRunner for NatsPipelineRunner {
    #[instrument(skip(self, request), fields(
        project = %request.project.key,
        pipeline = %request.pipeline.name,
        application = %request.application.name,
        environment = %request.environment.name
    ))]
    async fn run_pipeline(&self, request: &RunRequest) -> Result<(), QueueError> {
        let message = RunMessage::from(request);

        let payload = serde_json::to_vec(&message).map_err(|e| {
            QueueError::SerializationFailed(format!("Failed to serialize run request: {}", e))
        })?;

        let subject = self.get_subject(request);

        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Nats-Msg-Id", message.run_id.to_string().as_str());
        headers.insert("Project-Key", request.project.key.as_str());

        let publish_future: PublishAckFuture = self
            .client
            .jetstream()
            .publish_with_headers(subject.clone(), headers, payload.into())
            .await
            .map_err(|e| QueueError::PublishFailed(format!("Failed to publish message: {}", e)))?;

        // Wait for acknowledgment with timeout
        match tokio::time::timeout(self.publish_timeout, publish_future).await {
            Ok(Ok(_ack)) => {
                info!(
                    subject = %subject,
                    run_id = %message.run_id,
                    "Pipeline run accepted"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(QueueError::PublishFailed(format!(
                "Failed to get publish acknowledgment: {}",
                e
            ))),
            Err(_) => Err(QueueError::Timeout(format!(
                "Publish acknowledgment timeout after {:?}",
                self.publish_timeout
            ))),
        }
    }
}
