//! Queue transport abstraction.
//!
//! [`QueueDeliveryChannel`](crate::channel::QueueDeliveryChannel) talks to
//! the queue through [`QueueClient`] and obtains fresh clients from a
//! [`QueueClientFactory`] when credentials expire. The AWS implementation
//! lives in [`crate::sqs`].

use std::sync::Arc;

use async_trait::async_trait;
use servicebus_core::hashing::sha256_hex;
use servicebus_core::SqsConfig;
use servicebus_events::EventParams;

use crate::error::QueueError;

/// Provider error codes that mean the client's credentials are no longer
/// accepted and a fresh client may succeed.
pub const CREDENTIAL_EXPIRY_CODES: [&str; 3] = [
    "ExpiredToken",
    "UnrecognizedClientException",
    "InvalidClientTokenId",
];

// ---------------------------------------------------------------------------
// QueueSendError
// ---------------------------------------------------------------------------

/// Error reported by the queue provider for a single send.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", .code.as_deref().unwrap_or("Unknown"))]
pub struct QueueSendError {
    /// Provider error code, e.g. `ExpiredToken`.
    pub code: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl QueueSendError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Whether the failure means the credentials expired or were not recognized.
    pub fn is_credential_expiry(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| CREDENTIAL_EXPIRY_CODES.contains(&code))
    }
}

// ---------------------------------------------------------------------------
// OutboundMessage
// ---------------------------------------------------------------------------

/// One message ready to be enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub queue_url: String,
    /// JSON-serialized [`EventParams`].
    pub body: String,
    /// FIFO message group id (the event's `from`).
    pub group_id: Option<String>,
    /// FIFO deduplication id (SHA-256 of the body).
    pub deduplication_id: Option<String>,
}

impl OutboundMessage {
    /// Build the message for `params` on the queue described by `sqs`.
    ///
    /// FIFO queues get a group id and a body-derived deduplication id, so
    /// identical payloads collapse within the provider's dedup window.
    pub fn for_params(sqs: &SqsConfig, params: &EventParams) -> Result<Self, QueueError> {
        let body = params.to_json_string()?;

        let (group_id, deduplication_id) = if sqs.is_fifo() {
            let from = params
                .sender()
                .ok_or_else(|| QueueError::MalformedMessage("missing 'from'".into()))?;
            (Some(from.to_string()), Some(sha256_hex(body.as_bytes())))
        } else {
            (None, None)
        };

        Ok(Self {
            queue_url: sqs.queue_url.clone(),
            body,
            group_id,
            deduplication_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Sends messages to a queue.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Enqueue `message`, returning the provider's message id when known.
    async fn send_message(&self, message: &OutboundMessage) -> Result<Option<String>, QueueSendError>;
}

/// Creates [`QueueClient`]s, with freshly resolved credentials each time.
#[async_trait]
pub trait QueueClientFactory: Send + Sync {
    async fn connect(&self, sqs: &SqsConfig) -> Arc<dyn QueueClient>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
