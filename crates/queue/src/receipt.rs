//! Handle on one in-flight queue message.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::consumer::QueueService;
use crate::error::QueueError;

/// Ties to exactly one delivered message.
///
/// [`acknowledge`](Self::acknowledge) deletes it (with bounded retry);
/// [`abandon`](Self::abandon) leaves it for redelivery. Dropping an
/// unacknowledged handle behaves like `abandon`.
pub struct ReceiptHandle {
    service: Arc<dyn QueueService>,
    queue_url: String,
    message_id: String,
    token: String,
    policy: BackoffPolicy,
    completed: AtomicBool,
    released: AtomicBool,
}

impl std::fmt::Debug for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptHandle")
            .field("queue_url", &self.queue_url)
            .field("message_id", &self.message_id)
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl ReceiptHandle {
    pub fn new(
        service: Arc<dyn QueueService>,
        queue_url: impl Into<String>,
        message_id: impl Into<String>,
        token: impl Into<String>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            service,
            queue_url: queue_url.into(),
            message_id: message_id.into(),
            token: token.into(),
            policy,
            completed: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Delete the message from the queue.
    ///
    /// A failed delete is retried up to `policy.max_retries` times with
    /// exponential backoff, so the service sees at most `max_retries + 1`
    /// calls. Exhaustion yields [`QueueError::MaxRetry`]; cancellation during
    /// a backoff sleep yields [`QueueError::Cancelled`]. Either way the message
    /// stays queued. Calling this again after success is a no-op.
    pub async fn acknowledge(&self, cancel: &CancellationToken) -> Result<(), QueueError> {
        if self.is_completed() {
            debug!(message_id = %self.message_id, "message already acknowledged");
            return Ok(());
        }

        let mut retries = 0u32;
        loop {
            match self.service.delete(&self.queue_url, &self.token).await {
                Ok(()) => {
                    self.completed.store(true, Ordering::Release);
                    if retries > 0 {
                        info!(message_id = %self.message_id, retries, "Retry completed message");
                    } else {
                        info!(message_id = %self.message_id, "Completed message");
                    }
                    return Ok(());
                }
                Err(e) if retries >= self.policy.max_retries => {
                    error!(
                        message_id = %self.message_id,
                        attempts = retries + 1,
                        error = %e,
                        "Max retry count reached, giving up"
                    );
                    return Err(QueueError::MaxRetry {
                        message_id: self.message_id.clone(),
                        attempts: retries + 1,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.policy.delay(retries);
                    retries += 1;
                    warn!(
                        message_id = %self.message_id,
                        attempt = retries,
                        max_retries = self.policy.max_retries,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "Can't delete message, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            warn!(message_id = %self.message_id, "acknowledge cancelled, message left for redelivery");
                            return Err(QueueError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Give up on the message without deleting it.
    ///
    /// No-op after a successful acknowledge.
    pub fn abandon(&self) {
        if self.is_completed() || self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(
            message_id = %self.message_id,
            "Aborted message, left for redelivery"
        );
    }
}

impl Drop for ReceiptHandle {
    fn drop(&mut self) {
        self.abandon();
    }
}
