//! `servicebus-agent` -- publish one event to the service bus.
//!
//! Reads the delivery configuration from the environment (and `.env`),
//! builds an event from the command line and delivers it over HTTP or
//! SQS. Exits with status 1 when delivery fails.
//!
//! ```text
//! servicebus-agent <event-type> [payload-json]
//! ```
//!
//! # Environment variables
//!
//! | Variable                       | Required | Default | Description                              |
//! |--------------------------------|----------|---------|------------------------------------------|
//! | `SERVICE_BUS_TRANSPORT`        | no       | `http`  | `http` or `sqs`                          |
//! | `SERVICE_BUS_REFERENCE`        | no       | uuid    | Event reference                          |
//! | `SERVICE_BUS_ENABLED`          | no       | `false` | Deliver instead of only logging          |
//! | `SERVICE_BUS_ENDPOINT`         | http     | --      | Base URL of the bus API                  |
//! | `SERVICE_BUS_USERNAME`         | http     | --      | Login username                           |
//! | `SERVICE_BUS_PASSWORD`         | http     | --      | Login password                           |
//! | `SERVICE_BUS_VERSION`          | no       | `2.0.0` | Wire format version                      |
//! | `SERVICE_BUS_NODE_ID`          | v2       | --      | Sender id for version 2 and later        |
//! | `SERVICE_BUS_SQS_QUEUE_URL`    | sqs      | --      | Queue URL (`.fifo` selects FIFO)         |
//! | `SERVICE_BUS_SQS_REGION`       | sqs      | --      | AWS region of the queue                  |
//!
//! See [`ServiceBusConfig::from_env`] for the complete list.

use servicebus_agent::cli::{Invocation, Transport};
use servicebus_agent::dispatch::dispatch;
use servicebus_core::ServiceBusConfig;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "servicebus_agent=info,servicebus_events=info,servicebus_cloud=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let invocation = Invocation::parse(std::env::args().skip(1)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid arguments");
        std::process::exit(1);
    });

    let transport = Transport::from_setting(std::env::var("SERVICE_BUS_TRANSPORT").ok().as_deref())
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Invalid SERVICE_BUS_TRANSPORT");
            std::process::exit(1);
        });

    let reference = std::env::var("SERVICE_BUS_REFERENCE").unwrap_or_default();
    let config = ServiceBusConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid service bus configuration");
        std::process::exit(1);
    });

    if let Err(e) = dispatch(config, transport, &invocation, &reference).await {
        tracing::error!(error = %e, event_type = %invocation.event_type, "Delivery failed");
        std::process::exit(1);
    }
}
