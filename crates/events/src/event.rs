//! Service bus event descriptor and its wire serialization.
//!
//! [`ServiceBusEvent`] is a short-lived value describing one outbound
//! notification. It is created with [`ServiceBusEvent::create`] and enriched
//! with the consuming `with_*` methods, each of which returns a new value, so
//! a partially built event can be cloned and reused without aliasing.
//!
//! [`ServiceBusEvent::params`] turns the event into the flat [`EventParams`]
//! map sent to the bus. Its shape depends only on the configured version.

use std::fmt;

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{json, Map, Value};
use servicebus_core::types::Timestamp;
use servicebus_core::{ActionType, CoreError, ServiceBusConfig};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ServiceBusEvent
// ---------------------------------------------------------------------------

/// One outbound service bus notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceBusEvent {
    event_type: String,
    reference: String,
    culture: Option<String>,
    action: Option<(ActionType, String)>,
    route: Option<String>,
    created_at: Timestamp,
    payload: Map<String, Value>,
}

impl ServiceBusEvent {
    /// Start a new event of the given type.
    ///
    /// A UUID v4 reference is generated immediately and the creation
    /// timestamp is taken from the current time.
    pub fn create(event_type: impl Into<String>) -> Self {
        let event_type = event_type.into();
        let reference = Uuid::new_v4().to_string();
        tracing::debug!(%reference, event_type = %event_type, "Generated event reference");

        Self {
            event_type,
            reference,
            culture: None,
            action: None,
            route: None,
            created_at: chrono::Utc::now(),
            payload: Map::new(),
        }
    }

    /// Alias of [`ServiceBusEvent::create`].
    pub fn new(event_type: impl Into<String>) -> Self {
        Self::create(event_type)
    }

    /// Replace the generated reference with a caller-supplied one.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Set the culture, e.g. `en_GB`.
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(culture.into());
        self
    }

    /// Set the route the event relates to.
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Replace the whole payload.
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Set a single payload entry. A later call with the same name wins.
    pub fn with_resource(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// Attach the user the event concerns as `payload.users`.
    pub fn with_user(self, user: impl Into<Value>) -> Self {
        let user = user.into();
        self.with_resource("users", json!([user]))
    }

    /// Record who triggered the event.
    ///
    /// Fails with [`CoreError::Configuration`] when `action_type` is not one
    /// of the [`ActionType`] wire names.
    pub fn with_action(
        self,
        action_type: &str,
        reference: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let action_type: ActionType = action_type.parse()?;
        Ok(self.with_action_type(action_type, reference))
    }

    /// Typed variant of [`ServiceBusEvent::with_action`].
    pub fn with_action_type(mut self, action_type: ActionType, reference: impl Into<String>) -> Self {
        self.action = Some((action_type, reference.into()));
        self
    }

    /// Override the creation timestamp.
    pub fn created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn culture(&self) -> Option<&str> {
        self.culture.as_deref()
    }

    pub fn action_type(&self) -> Option<ActionType> {
        self.action.as_ref().map(|(t, _)| *t)
    }

    pub fn action_reference(&self) -> Option<&str> {
        self.action.as_ref().map(|(_, r)| r.as_str())
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn timestamp(&self) -> Timestamp {
        self.created_at
    }

    /// Serialize the event into the wire parameters for `config`'s version.
    ///
    /// Version 1 carries tenant, culture and action fields; version 2 and
    /// later drop them and identify the sender through `from` only.
    pub fn params(&self, config: &ServiceBusConfig) -> EventParams {
        let mut params = Map::new();
        let created_at = self
            .created_at
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        params.insert("events".into(), json!([self.event_type]));

        if config.is_legacy_format() {
            let culture = self.culture.as_deref().or(config.culture.as_deref());
            params.insert("venture_reference".into(), json!(self.reference));
            params.insert("reference".into(), json!(self.reference));
            params.insert(
                "venture_config_id".into(),
                json!(config.venture_config_id),
            );
            params.insert("from".into(), json!(config.venture_config_id));
            params.insert("created_at".into(), json!(created_at));
            params.insert("culture".into(), json!(culture));
            params.insert("action_type".into(), json!(self.action_type()));
            params.insert("action_reference".into(), json!(self.action_reference()));
        } else {
            params.insert("reference".into(), json!(self.reference));
            params.insert("from".into(), json!(config.node_id));
            params.insert("created_at".into(), json!(created_at));
        }

        params.insert("version".into(), json!(config.version));
        params.insert("route".into(), json!(self.route));
        params.insert("payload".into(), Value::Object(self.payload.clone()));

        EventParams(params)
    }
}

// ---------------------------------------------------------------------------
// EventParams
// ---------------------------------------------------------------------------

/// Flat wire representation of a [`ServiceBusEvent`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventParams(Map<String, Value>);

impl EventParams {
    /// Look up a single parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// The sender identifier, when present and non-empty.
    pub fn sender(&self) -> Option<&str> {
        self.0
            .get("from")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The first entry of `events`, when present.
    pub fn first_event(&self) -> Option<&str> {
        self.0
            .get("events")
            .and_then(Value::as_array)
            .and_then(|events| events.first())
            .and_then(Value::as_str)
    }

    /// Compact JSON body of the parameters.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for EventParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for EventParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
