//! Command-line parsing for the agent.
//!
//! The agent is invoked as `servicebus-agent <event-type> [payload-json]`.
//! The payload, when given, must be a JSON object and becomes the event
//! payload as-is.

use std::str::FromStr;

use serde_json::{Map, Value};
use servicebus_core::{ActionType, CoreError};
use servicebus_events::{ServiceBusEvent, ToServiceBus};

/// Action reference recorded on events published by the agent.
pub const AGENT_ACTION_REFERENCE: &str = "servicebus-agent";

/// Usage line printed on invalid arguments.
pub const USAGE: &str = "usage: servicebus-agent <event-type> [payload-json]";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{USAGE}")]
    Usage,

    #[error("Payload must be a JSON object")]
    PayloadNotObject,

    #[error("Invalid payload JSON: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Unknown transport '{0}' (expected 'http' or 'sqs')")]
    UnknownTransport(String),
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Which delivery channel the agent publishes through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transport {
    #[default]
    Http,
    Sqs,
}

impl Transport {
    /// Resolve the transport from an optional `SERVICE_BUS_TRANSPORT` value.
    pub fn from_setting(value: Option<&str>) -> Result<Self, CliError> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => v.parse(),
            None => Ok(Self::default()),
        }
    }
}

impl FromStr for Transport {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "sqs" | "queue" => Ok(Self::Sqs),
            _ => Err(CliError::UnknownTransport(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// One event to publish, as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub event_type: String,
    pub payload: Map<String, Value>,
}

impl Invocation {
    /// Parse the arguments following the program name.
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();

        let event_type = args
            .next()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(CliError::Usage)?;

        let payload = match args.next() {
            Some(raw) => match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => map,
                _ => return Err(CliError::PayloadNotObject),
            },
            None => Map::new(),
        };

        if args.next().is_some() {
            return Err(CliError::Usage);
        }

        Ok(Self {
            event_type,
            payload,
        })
    }
}

impl ToServiceBus<str> for Invocation {
    /// The notifiable is the event reference.
    fn to_service_bus(&self, reference: &str) -> Result<ServiceBusEvent, CoreError> {
        let mut event = ServiceBusEvent::create(self.event_type.clone())
            .with_action_type(ActionType::System, AGENT_ACTION_REFERENCE)
            .with_payload(self.payload.clone());
        if !reference.is_empty() {
            event = event.with_reference(reference);
        }
        Ok(event)
    }
}
