use servicebus_core::CoreError;

use crate::queue::QueueSendError;

/// Error type for queue delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Invalid configuration, or the notification built an invalid event.
    #[error(transparent)]
    Configuration(#[from] CoreError),

    /// The event parameters lack a field the queue needs.
    #[error("Malformed service bus message: {0}")]
    MalformedMessage(String),

    /// The event parameters could not be serialized.
    #[error("Failed to serialize service bus message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Credentials were rejected again after the client was reinitialized.
    #[error("Authentication failed after refreshing queue credentials: {source}")]
    AuthFailed {
        #[source]
        source: QueueSendError,
    },

    /// Any other provider error.
    #[error("Queue provider error: {0}")]
    Provider(#[source] QueueSendError),
}
