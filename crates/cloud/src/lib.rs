//! Queue transport for service bus events.
//!
//! [`QueueDeliveryChannel`] enqueues serialized events on an SQS queue
//! instead of calling the HTTP API. The queue client sits behind
//! [`QueueClient`] so the channel logic is independent of the AWS SDK.

pub mod channel;
pub mod error;
pub mod queue;
pub mod sqs;

pub use channel::{validate_message, QueueDeliveryChannel};
pub use error::QueueError;
pub use queue::{OutboundMessage, QueueClient, QueueClientFactory, QueueSendError};
pub use sqs::{SqsClientFactory, SqsQueueClient};
