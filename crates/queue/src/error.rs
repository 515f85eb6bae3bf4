//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue had nothing to deliver. Expected; not a failure.
    #[error("no message available")]
    NoMessage,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("queue not found: {0}")]
    NotFound(String),

    #[error("message {message_id} parse error: {reason}")]
    Parse { message_id: String, reason: String },

    #[error("acknowledge error: {0}")]
    Ack(String),

    /// Acknowledge retries exhausted; the message stays queued for redelivery.
    #[error("message {message_id}: max retry count reached after {attempts} attempts: {last_error}")]
    MaxRetry {
        message_id: String,
        attempts: u32,
        last_error: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("provider error: {0}")]
    Provider(String),
}

impl QueueError {
    pub fn is_no_message(&self) -> bool {
        matches!(self, QueueError::NoMessage)
    }
}
