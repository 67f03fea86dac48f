//! Queue transport for domain change events.
pub mod credentials;
pub mod sigv4;
pub mod sqs;

use async_trait::async_trait;

use crate::error::WorkerResult;

pub use credentials::{ContainerCredentials, CredentialSource};
pub use sqs::SqsClient;

/// A received message. Deleting it by `receipt_handle` acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Long-poll for up to `max_messages` (≤ 10), waiting at most
    /// `wait_time_seconds` (≤ 20).
    async fn receive(
        &self,
        max_messages: u8,
        wait_time_seconds: u8,
    ) -> WorkerResult<Vec<QueueMessage>>;

    async fn delete(&self, receipt_handle: &str) -> WorkerResult<()>;
}
