//! Pull one notification at a time and hand out its receipt.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use ferry_core::ObjectLocator;

use crate::backoff::BackoffPolicy;
use crate::consumer::QueueService;
use crate::error::QueueError;
use crate::parser::parse_locators;
use crate::receipt::ReceiptHandle;

/// One received message.
///
/// The receipt is present even when the body could not be parsed, so the
/// caller can still release it cleanly.
#[derive(Debug)]
pub struct Delivery {
    pub locators: Result<Vec<ObjectLocator>, QueueError>,
    pub receipt: ReceiptHandle,
}

impl Delivery {
    pub fn message_id(&self) -> &str {
        self.receipt.message_id()
    }
}

#[derive(Debug)]
struct QueueTarget {
    name: String,
    url: Option<String>,
}

/// Receives from a named queue, caching its resolved address.
pub struct Receiver {
    service: Arc<dyn QueueService>,
    target: Mutex<QueueTarget>,
    policy: BackoffPolicy,
}

impl Receiver {
    pub fn new(
        service: Arc<dyn QueueService>,
        queue_name: impl Into<String>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            service,
            target: Mutex::new(QueueTarget {
                name: queue_name.into(),
                url: None,
            }),
            policy,
        }
    }

    pub async fn queue_name(&self) -> String {
        self.target.lock().await.name.clone()
    }

    /// Point the receiver at another queue. Drops the cached address.
    pub async fn set_queue_name(&self, queue_name: impl Into<String>) {
        let mut target = self.target.lock().await;
        let queue_name = queue_name.into();
        if target.name != queue_name {
            info!(from = %target.name, to = %queue_name, "queue target changed");
            target.name = queue_name;
            target.url = None;
        }
    }

    /// Resolve the queue address on first use; later calls hit the cache.
    pub async fn queue_url(&self) -> Result<String, QueueError> {
        let mut target = self.target.lock().await;
        if let Some(url) = &target.url {
            return Ok(url.clone());
        }
        let url = self
            .service
            .resolve_queue_url(&target.name)
            .await
            .inspect_err(|e| error!(queue_name = %target.name, error = %e, "Can't resolve queue"))?;
        target.url = Some(url.clone());
        Ok(url)
    }

    /// Pull at most one message.
    ///
    /// An empty queue is [`QueueError::NoMessage`]. Cancellation while
    /// waiting on the long poll is [`QueueError::Cancelled`].
    pub async fn receive(&self, cancel: &CancellationToken) -> Result<Delivery, QueueError> {
        let queue_url = self.queue_url().await?;

        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(QueueError::Cancelled),
            received = self.service.receive_one(&queue_url) => received?,
        };
        let Some(msg) = received else {
            debug!("no message");
            return Err(QueueError::NoMessage);
        };

        info!(message_id = %msg.message_id, receive_count = msg.receive_count, "Received message");
        debug!(message_id = %msg.message_id, body = %msg.body, "message body");

        let locators = parse_locators(&msg);
        if let Err(e) = &locators {
            error!(message_id = %msg.message_id, error = %e, "Can't parse event from body");
        }

        let receipt = ReceiptHandle::new(
            self.service.clone(),
            queue_url,
            msg.message_id,
            msg.receipt_handle,
            self.policy.clone(),
        );
        Ok(Delivery { locators, receipt })
    }
}
