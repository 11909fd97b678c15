//! Publish an invocation through the selected channel.

use std::sync::Arc;

use servicebus_cloud::{QueueDeliveryChannel, QueueError};
use servicebus_core::{CoreError, ServiceBusConfig};
use servicebus_events::{DeliveryError, HttpDeliveryChannel, InMemoryTokenCache};

use crate::cli::{Invocation, Transport};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Configuration(#[from] CoreError),

    #[error("HTTP delivery failed: {0}")]
    Http(#[from] DeliveryError),

    #[error("Queue delivery failed: {0}")]
    Queue(#[from] QueueError),
}

/// Build the channel for `transport` and deliver `invocation` once.
///
/// `reference` becomes the event reference; an empty string keeps the
/// generated UUID.
pub async fn dispatch(
    config: ServiceBusConfig,
    transport: Transport,
    invocation: &Invocation,
    reference: &str,
) -> Result<(), DispatchError> {
    tracing::info!(
        event_type = %invocation.event_type,
        transport = ?transport,
        enabled = config.enabled,
        "Publishing service bus event",
    );

    match transport {
        Transport::Http => {
            let channel = HttpDeliveryChannel::new(config, Arc::new(InMemoryTokenCache::new()))?;
            channel.send(reference, invocation).await?;
        }
        Transport::Sqs => {
            let channel = QueueDeliveryChannel::connect(config).await?;
            channel.send(reference, invocation).await?;
        }
    }

    Ok(())
}
