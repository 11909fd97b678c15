//! HTTP delivery to the service bus API with token auth.
//!
//! [`HttpDeliveryChannel`] POSTs the serialized event to `{endpoint}/events`
//! with the cached auth token in the `x-api-key` header. Tokens come from
//! `{endpoint}/login` and are cached forever under
//! [`ServiceBusConfig::token_key`].
//!
//! When the bus answers 401 or 403 the cached token is dropped and the
//! delivery is attempted once more with a fresh login. A second rejection is
//! terminal ([`DeliveryError::AuthFailed`]). Every other failure is returned
//! immediately, wrapped in [`DeliveryError::RequestFailed`].
//!
//! The retry budget lives on the stack of each [`HttpDeliveryChannel::send`]
//! call, so one channel can serve concurrent sends.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde_json::{json, Map, Value};
use servicebus_core::{CoreError, ServiceBusConfig};

use crate::cache::TokenCache;
use crate::event::{EventParams, ServiceBusEvent};
use crate::notification::ToServiceBus;

/// Header carrying the auth token on event requests.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Relative path of the login endpoint.
const LOGIN_PATH: &str = "login";

/// Relative path of the events endpoint.
const EVENTS_PATH: &str = "events";

/// How many times a rejected token is replaced before giving up.
const MAX_AUTH_RETRIES: u8 = 1;

const MIME_JSON: &str = "application/json";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Failure of a single HTTP call to the bus.
#[derive(Debug, thiserror::Error)]
pub enum RequestFailure {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The bus answered with a non-2xx status other than 401/403.
    #[error("Service bus returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Error type for service bus delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The bus rejected a freshly obtained token as well.
    #[error("Service bus rejected the auth token after logging in again (HTTP {status})")]
    AuthFailed { status: u16 },

    /// The login endpoint answered with an application code other than 200.
    #[error("Service bus login failed with code {code}: {body}")]
    LoginFailed { code: i64, body: String },

    /// Any other failed request, before or after an auth retry.
    #[error("Service bus request failed: {0}")]
    RequestFailed(#[from] RequestFailure),

    /// The notification could not produce a valid event.
    #[error(transparent)]
    Event(#[from] CoreError),
}

/// Outcome of one delivery attempt that did not succeed.
#[derive(Debug)]
enum AttemptError {
    /// The token was rejected; a fresh login may fix it.
    Unauthorized(u16),
    /// Terminal for this send.
    Failed(DeliveryError),
}

impl From<DeliveryError> for AttemptError {
    fn from(err: DeliveryError) -> Self {
        AttemptError::Failed(err)
    }
}

impl From<RequestFailure> for AttemptError {
    fn from(err: RequestFailure) -> Self {
        AttemptError::Failed(err.into())
    }
}

impl From<CoreError> for AttemptError {
    fn from(err: CoreError) -> Self {
        AttemptError::Failed(err.into())
    }
}

// ---------------------------------------------------------------------------
// HttpDeliveryChannel
// ---------------------------------------------------------------------------

/// Delivers service bus events over the HTTP API.
pub struct HttpDeliveryChannel {
    config: ServiceBusConfig,
    base_url: Option<Url>,
    client: reqwest::Client,
    cache: Arc<dyn TokenCache>,
}

impl HttpDeliveryChannel {
    /// Create a channel for `config`, caching tokens in `cache`.
    ///
    /// Fails with [`CoreError::Configuration`] when an enabled configuration
    /// lacks the endpoint, credentials or tenant id.
    pub fn new(config: ServiceBusConfig, cache: Arc<dyn TokenCache>) -> Result<Self, CoreError> {
        config.validate_for_http()?;

        let base_url = config.endpoint.as_deref().map(parse_base_url).transpose()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CoreError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            base_url,
            client,
            cache,
        })
    }

    pub fn config(&self) -> &ServiceBusConfig {
        &self.config
    }

    /// Cache key of this channel's auth token.
    pub fn token_key(&self) -> String {
        self.config.token_key()
    }

    /// Build the notification's event for `notifiable` and deliver it.
    pub async fn send<N, T>(&self, notifiable: &N, notification: &T) -> Result<(), DeliveryError>
    where
        N: ?Sized,
        T: ToServiceBus<N> + ?Sized,
    {
        let event = notification.to_service_bus(notifiable)?;
        self.deliver(&event).await
    }

    /// Deliver an already built event.
    pub async fn deliver(&self, event: &ServiceBusEvent) -> Result<(), DeliveryError> {
        let event_type = event.event_type();
        let params = event.params(&self.config);
        let report = self.config.should_report(event_type);

        if !self.config.enabled {
            if report {
                tracing::debug!(
                    event_type,
                    params = %params,
                    tags = "service-bus",
                    "{event_type} service bus notification [disabled]"
                );
            }
            return Ok(());
        }

        let mut auth_retries_left = MAX_AUTH_RETRIES;

        loop {
            match self.attempt(&params).await {
                Ok((status, body)) => {
                    if report {
                        tracing::info!(
                            event_type,
                            params = %params,
                            status,
                            body = %body,
                            tags = "service-bus",
                            "{event_type} service bus notification"
                        );
                    }
                    return Ok(());
                }
                Err(AttemptError::Unauthorized(status)) if auth_retries_left > 0 => {
                    auth_retries_left -= 1;
                    tracing::info!(
                        event_type,
                        status,
                        tags = "service-bus",
                        "{status} received. Logging in and retrying."
                    );
                    self.cache.forget(&self.token_key()).await;
                }
                Err(AttemptError::Unauthorized(status)) => {
                    tracing::warn!(
                        event_type,
                        status,
                        tags = "service-bus",
                        "Service bus rejected a fresh token, giving up"
                    );
                    return Err(DeliveryError::AuthFailed { status });
                }
                Err(AttemptError::Failed(e)) => return Err(e),
            }
        }
    }

    /// Resolve a token and POST the event once.
    ///
    /// Returns the response status and body on success.
    async fn attempt(&self, params: &EventParams) -> Result<(u16, String), AttemptError> {
        let token = self.token().await?;

        let response = self
            .client
            .post(self.url(EVENTS_PATH)?)
            .header(ACCEPT, MIME_JSON)
            .header(API_KEY_HEADER, token)
            .json(&[params])
            .send()
            .await
            .map_err(RequestFailure::from)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AttemptError::Unauthorized(status.as_u16()));
        }

        let body = response.text().await.map_err(RequestFailure::from)?;
        if !status.is_success() {
            return Err(RequestFailure::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        Ok((status.as_u16(), body))
    }

    /// Cached token, logging in on a miss.
    async fn token(&self) -> Result<String, DeliveryError> {
        let key = self.token_key();
        if let Some(token) = self.cache.get(&key).await {
            return Ok(token);
        }

        let token = self.login().await?;
        self.cache.put_forever(&key, &token).await;
        Ok(token)
    }

    /// Exchange the configured credentials for a new token.
    async fn login(&self) -> Result<String, DeliveryError> {
        let mut credentials = Map::new();
        credentials.insert("username".into(), json!(self.config.username));
        credentials.insert("password".into(), json!(self.config.password));
        credentials.insert(
            self.config.tenant_field().into(),
            json!(self.config.tenant_id()),
        );

        tracing::debug!(
            tenant_field = self.config.tenant_field(),
            tags = "service-bus",
            "Logging in to service bus"
        );

        let response = self
            .client
            .post(self.url(LOGIN_PATH)?)
            .header(ACCEPT, MIME_JSON)
            .json(&credentials)
            .send()
            .await
            .map_err(RequestFailure::from)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(RequestFailure::from)?;
        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(application_code)
            .unwrap_or_else(|| i64::from(status));
        let token = parsed
            .as_ref()
            .and_then(|v| v.get("token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());

        match (code, token) {
            (200, Some(token)) => Ok(token.to_string()),
            _ => {
                tracing::warn!(code, tags = "service-bus", "Service bus login rejected");
                Err(DeliveryError::LoginFailed { code, body })
            }
        }
    }

    fn url(&self, path: &str) -> Result<Url, CoreError> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| CoreError::configuration("endpoint is required"))?;
        base.join(path)
            .map_err(|e| CoreError::configuration(format!("Invalid endpoint path '{path}': {e}")))
    }
}

/// Parse the endpoint so relative joins append to its last segment.
fn parse_base_url(endpoint: &str) -> Result<Url, CoreError> {
    let mut endpoint = endpoint.trim().to_string();
    if !endpoint.ends_with('/') {
        endpoint.push('/');
    }
    Url::parse(&endpoint)
        .map_err(|e| CoreError::configuration(format!("Invalid endpoint '{endpoint}': {e}")))
}

/// Numeric application code from a login body; accepts `200` or `"200"`.
fn application_code(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
