//! AWS SQS queue implementation.

use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_credential_types::Credentials;
use aws_sdk_sqs::config::BehaviorVersion;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;
use chrono::{TimeZone, Utc};
use tracing::{debug, info};

use ferry_core::config::{AwsConfig, ReceiverConfig};

use crate::consumer::{QueueMessage, QueueService};
use crate::error::QueueError;

/// SQS-backed queue service.
pub struct SqsQueue {
    client: Client,
    wait_time_seconds: i32,
    visibility_timeout_secs: Option<i32>,
}

impl SqsQueue {
    /// Create a new SQS client from project config.
    ///
    /// Static keys win; otherwise the SDK default credential chain (env,
    /// profile, web identity, ECS/IMDS) is used.
    pub async fn new(aws: &AwsConfig, receiver: &ReceiverConfig) -> Self {
        let region = aws_sdk_sqs::config::Region::new(aws.region.clone());

        // Build SQS client config directly so a shared AWS_ENDPOINT_URL meant
        // for S3 does not leak into SQS; the endpoint comes from `sqs_endpoint`.
        let mut sqs_config = aws_sdk_sqs::Config::builder()
            .region(region.clone())
            .behavior_version(BehaviorVersion::latest());

        // Use static credentials if provided (local dev / explicit config).
        if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "ferry-queue-static",
            );
            sqs_config = sqs_config.credentials_provider(creds);
        } else {
            let chain = DefaultCredentialsChain::builder().region(region).build().await;
            sqs_config = sqs_config.credentials_provider(chain);
        }

        if let Some(url) = aws.endpoint_url(&aws.sqs_endpoint) {
            sqs_config = sqs_config.endpoint_url(url);
        }

        let client = Client::from_conf(sqs_config.build());

        info!(
            region = %aws.region,
            endpoint = aws.sqs_endpoint.as_deref().unwrap_or("(default)"),
            "SQS client initialized"
        );

        Self {
            client,
            wait_time_seconds: receiver.wait_time_seconds.clamp(0, 20),
            visibility_timeout_secs: receiver.visibility_timeout_secs,
        }
    }
}

#[async_trait]
impl QueueService for SqsQueue {
    async fn resolve_queue_url(&self, queue_name: &str) -> Result<String, QueueError> {
        info!(queue_name, "Connecting to SQS");
        let resp = self
            .client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| QueueError::NotFound(format!("{queue_name}: {e:?}")))?;

        let url = resp
            .queue_url()
            .ok_or_else(|| QueueError::NotFound(queue_name.to_string()))?
            .to_string();
        debug!(queue_url = %url, "Resolved queue URL");
        Ok(url)
    }

    async fn receive_one(&self, queue_url: &str) -> Result<Option<QueueMessage>, QueueError> {
        let mut request = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(self.wait_time_seconds)
            .message_system_attribute_names(MessageSystemAttributeName::All);
        if let Some(timeout) = self.visibility_timeout_secs {
            request = request.visibility_timeout(timeout);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS receive failed: {e:?}")))?;

        let Some(msg) = resp.messages.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };

        let message_id = msg.message_id().unwrap_or("unknown").to_string();
        let body = msg.body().unwrap_or("").to_string();
        let receipt_handle = msg
            .receipt_handle()
            .ok_or_else(|| QueueError::Parse {
                message_id: message_id.clone(),
                reason: "missing receipt handle".into(),
            })?
            .to_string();

        // SentTimestamp is epoch millis.
        let sent_at = msg
            .attributes()
            .and_then(|attrs| attrs.get(&MessageSystemAttributeName::SentTimestamp))
            .and_then(|ts| ts.parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        let receive_count = msg
            .attributes()
            .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .and_then(|c| c.parse::<u32>().ok())
            .unwrap_or(1);

        Ok(Some(QueueMessage {
            message_id,
            body,
            receipt_handle,
            sent_at,
            receive_count,
        }))
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        debug!(receipt_handle, "Deleting SQS message");

        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Ack(format!("SQS delete failed: {e:?}")))?;

        Ok(())
    }
}
