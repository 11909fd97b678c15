//! AWS SQS implementation of [`QueueClient`].

use std::sync::Arc;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_sqs::config::{BehaviorVersion, Region};
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata};
use servicebus_core::SqsConfig;

use crate::queue::{OutboundMessage, QueueClient, QueueClientFactory, QueueSendError};

/// Provider name reported for statically configured credentials.
const STATIC_CREDENTIALS_PROVIDER: &str = "service-bus-static";

/// [`QueueClient`] backed by `aws_sdk_sqs`.
#[derive(Debug, Clone)]
pub struct SqsQueueClient {
    client: aws_sdk_sqs::Client,
}

impl SqsQueueClient {
    /// Build a client for the queue's region.
    ///
    /// Uses the static key pair when both halves are configured, otherwise
    /// the default AWS provider chain (environment, profile, IMDS, ...).
    pub async fn connect(sqs: &SqsConfig) -> Self {
        let region = Region::new(sqs.region.clone());

        let client = match sqs.static_credentials() {
            Some((key, secret)) => {
                let credentials =
                    Credentials::new(key, secret, None, None, STATIC_CREDENTIALS_PROVIDER);
                let config = aws_sdk_sqs::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
                    .build();
                aws_sdk_sqs::Client::from_conf(config)
            }
            None => {
                let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_sqs::Client::new(&shared)
            }
        };

        tracing::debug!(region = %sqs.region, "SQS client initialized");
        Self { client }
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn send_message(&self, message: &OutboundMessage) -> Result<Option<String>, QueueSendError> {
        let output = self
            .client
            .send_message()
            .queue_url(&message.queue_url)
            .message_body(&message.body)
            .set_message_group_id(message.group_id.clone())
            .set_message_deduplication_id(message.deduplication_id.clone())
            .send()
            .await
            .map_err(|e| {
                let message = e
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| DisplayErrorContext(&e).to_string());
                QueueSendError::new(e.code(), message)
            })?;

        Ok(output.message_id().map(str::to_string))
    }
}

/// Factory producing [`SqsQueueClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqsClientFactory;

#[async_trait]
impl QueueClientFactory for SqsClientFactory {
    async fn connect(&self, sqs: &SqsConfig) -> Arc<dyn QueueClient> {
        Arc::new(SqsQueueClient::connect(sqs).await)
    }
}
