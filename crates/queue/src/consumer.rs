//! Queue service trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::QueueError;

/// One delivery pulled off the queue, before its body is parsed.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    /// Raw body; for S3 notifications a JSON event document.
    pub body: String,
    /// Provider-specific delivery token used to delete the message.
    pub receipt_handle: String,
    pub sent_at: DateTime<Utc>,
    /// Approximate number of deliveries including this one.
    pub receive_count: u32,
}

/// Low-level queue operations the receiver is built on.
///
/// Implementations handle the specifics of a provider (SQS) and must not
/// retry internally beyond what the provider SDK does on its own.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Resolve a queue name to the address used by the other calls.
    async fn resolve_queue_url(&self, queue_name: &str) -> Result<String, QueueError>;

    /// Pull at most one message. `Ok(None)` when the queue is empty.
    ///
    /// May block for up to the provider's long-poll timeout.
    async fn receive_one(&self, queue_url: &str) -> Result<Option<QueueMessage>, QueueError>;

    /// Delete a delivered message by its delivery token.
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError>;
}
