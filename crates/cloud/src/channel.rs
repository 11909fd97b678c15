//! Queue delivery channel.
//!
//! [`QueueDeliveryChannel`] serializes the event and enqueues it. A message
//! without a sender (`from`) or an event type is logged and dropped rather
//! than failing the caller. When the provider reports expired or unknown
//! credentials, the client is rebuilt and the send is retried once; a second
//! rejection fails with [`QueueError::AuthFailed`].

use std::sync::Arc;

use servicebus_core::{CoreError, ServiceBusConfig, SqsConfig};
use servicebus_events::{EventParams, ServiceBusEvent, ToServiceBus};
use tokio::sync::RwLock;

use crate::error::QueueError;
use crate::queue::{OutboundMessage, QueueClient, QueueClientFactory};
use crate::sqs::SqsClientFactory;

/// How many times the client is rebuilt after a credential error.
const MAX_CREDENTIAL_REFRESHES: u8 = 1;

/// Check that `params` carry a sender and at least one event type.
pub fn validate_message(params: &EventParams) -> Result<(), QueueError> {
    if params.sender().is_none() {
        return Err(QueueError::MalformedMessage("missing 'from'".into()));
    }
    if params.first_event().is_none() {
        return Err(QueueError::MalformedMessage("missing 'events'".into()));
    }
    Ok(())
}

/// Client and settings of an enabled channel.
struct Connection {
    sqs: SqsConfig,
    client: RwLock<Arc<dyn QueueClient>>,
}

/// Delivers service bus events through a message queue.
pub struct QueueDeliveryChannel {
    config: ServiceBusConfig,
    factory: Arc<dyn QueueClientFactory>,
    connection: Option<Connection>,
}

impl QueueDeliveryChannel {
    /// Create a channel backed by AWS SQS.
    pub async fn connect(config: ServiceBusConfig) -> Result<Self, QueueError> {
        Self::with_client_factory(config, Arc::new(SqsClientFactory)).await
    }

    /// Create a channel whose clients come from `factory`.
    ///
    /// A disabled configuration without queue settings creates no client.
    pub async fn with_client_factory(
        config: ServiceBusConfig,
        factory: Arc<dyn QueueClientFactory>,
    ) -> Result<Self, QueueError> {
        let connection = match config.validate_for_queue()? {
            Some(sqs) => {
                let client = factory.connect(sqs).await;
                Some(Connection {
                    sqs: sqs.clone(),
                    client: RwLock::new(client),
                })
            }
            None => None,
        };

        Ok(Self {
            config,
            factory,
            connection,
        })
    }

    pub fn config(&self) -> &ServiceBusConfig {
        &self.config
    }

    /// Build the notification's event for `notifiable` and enqueue it.
    pub async fn send<N, T>(&self, notifiable: &N, notification: &T) -> Result<(), QueueError>
    where
        N: ?Sized,
        T: ToServiceBus<N> + ?Sized,
    {
        let event = notification.to_service_bus(notifiable)?;
        self.deliver(&event).await
    }

    /// Enqueue an already built event.
    pub async fn deliver(&self, event: &ServiceBusEvent) -> Result<(), QueueError> {
        let event_type = event.event_type();
        let params = event.params(&self.config);

        if !self.config.enabled {
            if self.config.should_report(event_type) {
                tracing::debug!(
                    event_type,
                    params = %params,
                    tags = "service-bus",
                    "{event_type} service bus notification [disabled]"
                );
            }
            return Ok(());
        }

        if let Err(e) = validate_message(&params) {
            tracing::error!(error = %e, message = %params, "Invalid message structure");
            return Ok(());
        }

        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| CoreError::configuration("sqs settings are required"))?;
        let message = OutboundMessage::for_params(&connection.sqs, &params)?;

        let mut refreshes_left = MAX_CREDENTIAL_REFRESHES;

        loop {
            let client = Arc::clone(&*connection.client.read().await);

            match client.send_message(&message).await {
                Ok(message_id) => {
                    if self.config.should_report(event_type) {
                        tracing::info!(
                            message_id = message_id.as_deref().unwrap_or_default(),
                            event = event_type,
                            "{event_type} sent to bus queue"
                        );
                    }
                    return Ok(());
                }
                Err(e) if e.is_credential_expiry() && refreshes_left > 0 => {
                    refreshes_left -= 1;
                    tracing::info!(
                        event_type,
                        aws_error_code = e.code.as_deref().unwrap_or_default(),
                        aws_error_message = %e.message,
                        tags = "service-bus",
                        "{} received. Refreshing credentials and retrying.",
                        e.code.as_deref().unwrap_or_default()
                    );
                    let fresh = self.factory.connect(&connection.sqs).await;
                    *connection.client.write().await = fresh;
                }
                Err(e) if e.is_credential_expiry() => {
                    tracing::warn!(
                        event_type,
                        error = %e,
                        tags = "service-bus",
                        "Queue credentials rejected after refresh, giving up"
                    );
                    return Err(QueueError::AuthFailed { source: e });
                }
                Err(e) => return Err(QueueError::Provider(e)),
            }
        }
    }
}
