//! Service bus delivery configuration.
//!
//! [`ServiceBusConfig`] is supplied once per channel instance and never
//! mutated afterwards. It can be deserialized from any serde source or
//! loaded from `SERVICE_BUS_*` environment variables via
//! [`ServiceBusConfig::from_env`]. Each channel validates the fields it
//! needs when it is constructed.

use std::fmt;

use serde::Deserialize;

use crate::error::CoreError;
use crate::hashing::sha256_hex;

/// Default wire format version when `SERVICE_BUS_VERSION` is not set.
pub const DEFAULT_VERSION: &str = "2.0.0";

/// Default HTTP request timeout for a single call to the service bus.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Prefix hashed together with the tenant id to build the token cache key.
const TOKEN_KEY_PREFIX: &str = "service-bus-token";

// ---------------------------------------------------------------------------
// SqsConfig
// ---------------------------------------------------------------------------

/// Queue transport settings.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SqsConfig {
    /// Full queue URL. A `.fifo` suffix selects FIFO semantics.
    pub queue_url: String,
    /// AWS region of the queue, e.g. `eu-west-1`.
    pub region: String,
    /// Static access key id. Falls back to the default provider chain when unset.
    pub key: Option<String>,
    /// Static secret access key.
    pub secret: Option<String>,
}

impl SqsConfig {
    /// Whether the configured queue is a FIFO queue.
    pub fn is_fifo(&self) -> bool {
        self.queue_url.ends_with(".fifo")
    }

    /// Static credentials, when both halves are configured.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.key, &self.secret) {
            (Some(key), Some(secret)) => Some((key.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for SqsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsConfig")
            .field("queue_url", &self.queue_url)
            .field("region", &self.region)
            .field("key", &self.key)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ServiceBusConfig
// ---------------------------------------------------------------------------

/// Static delivery configuration for the service bus channels.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ServiceBusConfig {
    /// When `false`, channels log the event and skip delivery.
    pub enabled: bool,
    /// Base URL of the service bus HTTP API, e.g. `https://bus.example.com/v1/`.
    pub endpoint: Option<String>,
    /// Login username.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Tenant id used by wire format version 1.
    pub venture_config_id: Option<String>,
    /// Tenant id used by wire format version 2 and later.
    pub node_id: Option<String>,
    /// Wire format version string, e.g. `"2.0.0"`.
    pub version: String,
    /// Culture used when an event does not carry its own.
    pub culture: Option<String>,
    /// Event types that are never logged.
    pub dont_report: Vec<String>,
    /// Optional suffix mixed into the token cache key.
    pub token_tag: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Queue transport settings.
    pub sqs: Option<SqsConfig>,
}

impl Default for ServiceBusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            username: None,
            password: None,
            venture_config_id: None,
            node_id: None,
            version: DEFAULT_VERSION.to_string(),
            culture: None,
            dont_report: Vec::new(),
            token_tag: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            sqs: None,
        }
    }
}

impl fmt::Debug for ServiceBusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBusConfig")
            .field("enabled", &self.enabled)
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("venture_config_id", &self.venture_config_id)
            .field("node_id", &self.node_id)
            .field("version", &self.version)
            .field("culture", &self.culture)
            .field("dont_report", &self.dont_report)
            .field("token_tag", &self.token_tag)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("sqs", &self.sqs)
            .finish()
    }
}

impl ServiceBusConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                           | Default  |
    /// |------------------------------------|----------|
    /// | `SERVICE_BUS_ENABLED`              | `false`  |
    /// | `SERVICE_BUS_ENDPOINT`             | --       |
    /// | `SERVICE_BUS_USERNAME`             | --       |
    /// | `SERVICE_BUS_PASSWORD`             | --       |
    /// | `SERVICE_BUS_VENTURE_CONFIG_ID`    | --       |
    /// | `SERVICE_BUS_NODE_ID`              | --       |
    /// | `SERVICE_BUS_VERSION`              | `2.0.0`  |
    /// | `SERVICE_BUS_CULTURE`              | --       |
    /// | `SERVICE_BUS_DONT_REPORT`          | empty    |
    /// | `SERVICE_BUS_TOKEN_TAG`            | --       |
    /// | `SERVICE_BUS_REQUEST_TIMEOUT_SECS` | `30`     |
    /// | `SERVICE_BUS_SQS_QUEUE_URL`        | --       |
    /// | `SERVICE_BUS_SQS_REGION`           | --       |
    /// | `SERVICE_BUS_SQS_KEY`              | --       |
    /// | `SERVICE_BUS_SQS_SECRET`           | --       |
    ///
    /// Blank values count as unset.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let enabled = match var("SERVICE_BUS_ENABLED") {
            Some(v) => parse_bool("SERVICE_BUS_ENABLED", &v)?,
            None => false,
        };

        let request_timeout_secs = match var("SERVICE_BUS_REQUEST_TIMEOUT_SECS") {
            Some(v) => v.trim().parse().map_err(|_| {
                CoreError::configuration(
                    "SERVICE_BUS_REQUEST_TIMEOUT_SECS must be a valid u64",
                )
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let dont_report = var("SERVICE_BUS_DONT_REPORT")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let queue_url = var("SERVICE_BUS_SQS_QUEUE_URL");
        let region = var("SERVICE_BUS_SQS_REGION");
        let sqs = if queue_url.is_some() || region.is_some() {
            Some(SqsConfig {
                queue_url: queue_url.unwrap_or_default(),
                region: region.unwrap_or_default(),
                key: var("SERVICE_BUS_SQS_KEY"),
                secret: var("SERVICE_BUS_SQS_SECRET"),
            })
        } else {
            None
        };

        Ok(Self {
            enabled,
            endpoint: var("SERVICE_BUS_ENDPOINT"),
            username: var("SERVICE_BUS_USERNAME"),
            password: var("SERVICE_BUS_PASSWORD"),
            venture_config_id: var("SERVICE_BUS_VENTURE_CONFIG_ID"),
            node_id: var("SERVICE_BUS_NODE_ID"),
            version: var("SERVICE_BUS_VERSION").unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            culture: var("SERVICE_BUS_CULTURE"),
            dont_report,
            token_tag: var("SERVICE_BUS_TOKEN_TAG"),
            request_timeout_secs,
            sqs,
        })
    }

    /// Major component of the configured version (`"2.0.0"` -> `2`).
    ///
    /// Reads leading digits only; a version without any yields `0`.
    pub fn major_version(&self) -> u32 {
        let digits: String = self
            .version
            .trim()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().unwrap_or(0)
    }

    /// Whether the legacy (version 1) wire format is in use.
    pub fn is_legacy_format(&self) -> bool {
        self.major_version() < 2
    }

    /// Name of the tenant field for the configured version.
    pub fn tenant_field(&self) -> &'static str {
        if self.is_legacy_format() {
            "venture_config_id"
        } else {
            "node_id"
        }
    }

    /// Tenant identifier for the configured version.
    pub fn tenant_id(&self) -> Option<&str> {
        if self.is_legacy_format() {
            self.venture_config_id.as_deref()
        } else {
            self.node_id.as_deref()
        }
    }

    /// Whether delivery of `event_type` should be logged.
    pub fn should_report(&self, event_type: &str) -> bool {
        !self.dont_report.iter().any(|t| t == event_type)
    }

    /// Deterministic cache key for the tenant's auth token.
    ///
    /// Depends only on the tenant id (and the optional tag), so the same
    /// configuration maps to the same key across process restarts.
    pub fn token_key(&self) -> String {
        let mut material = format!("{TOKEN_KEY_PREFIX}{}", self.tenant_id().unwrap_or_default());
        if let Some(tag) = &self.token_tag {
            material.push(':');
            material.push_str(tag);
        }
        sha256_hex(material.as_bytes())
    }

    /// Check the fields the HTTP channel needs.
    ///
    /// A disabled configuration never talks to the network, so only the
    /// endpoint shape is checked in that case.
    pub fn validate_for_http(&self) -> Result<(), CoreError> {
        if let Some(endpoint) = &self.endpoint {
            if endpoint_host(endpoint).is_none() {
                return Err(CoreError::configuration(format!(
                    "endpoint must be an absolute http(s) URL with a host (got '{endpoint}')"
                )));
            }
        }

        if !self.enabled {
            return Ok(());
        }

        require("endpoint", self.endpoint.as_deref())?;
        require("username", self.username.as_deref())?;
        require("password", self.password.as_deref())?;
        require(self.tenant_field(), self.tenant_id())?;
        Ok(())
    }

    /// Check the fields the queue channel needs.
    ///
    /// A disabled configuration may omit the queue settings entirely, in
    /// which case `Ok(None)` is returned. The tenant id is not required here:
    /// the queue channel drops messages without a sender at send time.
    pub fn validate_for_queue(&self) -> Result<Option<&SqsConfig>, CoreError> {
        let sqs = match (&self.sqs, self.enabled) {
            (Some(sqs), _) => sqs,
            (None, false) => return Ok(None),
            (None, true) => return Err(CoreError::configuration("sqs settings are required")),
        };

        require("sqs.queue_url", Some(sqs.queue_url.as_str()))?;
        require("sqs.region", Some(sqs.region.as_str()))?;
        if sqs.key.is_some() != sqs.secret.is_some() {
            return Err(CoreError::configuration(
                "sqs.key and sqs.secret must be set together",
            ));
        }
        Ok(Some(sqs))
    }
}

/// Host of an `http`/`https` endpoint, or `None` when the scheme is wrong or
/// the authority has no host. Full URL parsing happens in the HTTP channel.
fn endpoint_host(endpoint: &str) -> Option<&str> {
    let rest = endpoint
        .trim()
        .strip_prefix("https://")
        .or_else(|| endpoint.trim().strip_prefix("http://"))?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = if host_port.starts_with('[') {
        host_port.split_inclusive(']').next().unwrap_or_default()
    } else {
        host_port.split(':').next().unwrap_or_default()
    };
    Some(host).filter(|h| !h.is_empty())
}

fn require(field: &str, value: Option<&str>) -> Result<(), CoreError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(CoreError::configuration(format!("{field} is required"))),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, CoreError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::configuration(format!(
            "{name} must be a boolean (got '{value}')"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn http_config(version: &str) -> ServiceBusConfig {
        ServiceBusConfig {
            enabled: true,
            endpoint: Some("https://bus.example.com/v1/".into()),
            username: Some("username".into()),
            password: Some("password".into()),
            venture_config_id: Some("V1".into()),
            node_id: Some("123456789".into()),
            version: version.into(),
            ..Default::default()
        }
    }

    #[test]
    fn from_lookup_applies_defaults() {
        let config = ServiceBusConfig::from_lookup(lookup(&[])).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.version, DEFAULT_VERSION);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.dont_report.is_empty());
        assert!(config.sqs.is_none());
    }

    #[test]
    fn from_lookup_reads_all_fields() {
        let config = ServiceBusConfig::from_lookup(lookup(&[
            ("SERVICE_BUS_ENABLED", "true"),
            ("SERVICE_BUS_ENDPOINT", "https://bus.example.com/v1/"),
            ("SERVICE_BUS_USERNAME", "user"),
            ("SERVICE_BUS_PASSWORD", "secret"),
            ("SERVICE_BUS_NODE_ID", "node-1"),
            ("SERVICE_BUS_VERSION", "2.1.0"),
            ("SERVICE_BUS_CULTURE", "en_GB"),
            ("SERVICE_BUS_DONT_REPORT", "UserLoggedIn, ,HeartBeat"),
            ("SERVICE_BUS_REQUEST_TIMEOUT_SECS", "5"),
            ("SERVICE_BUS_SQS_QUEUE_URL", "https://sqs.eu-west-1.amazonaws.com/1/bus.fifo"),
            ("SERVICE_BUS_SQS_REGION", "eu-west-1"),
        ]))
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.node_id.as_deref(), Some("node-1"));
        assert_eq!(config.culture.as_deref(), Some("en_GB"));
        assert_eq!(config.dont_report, vec!["UserLoggedIn", "HeartBeat"]);
        assert_eq!(config.request_timeout_secs, 5);
        let sqs = config.sqs.as_ref().unwrap();
        assert!(sqs.is_fifo());
        assert!(sqs.static_credentials().is_none());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config =
            ServiceBusConfig::from_lookup(lookup(&[("SERVICE_BUS_ENDPOINT", "  ")])).unwrap();
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert_matches!(
            ServiceBusConfig::from_lookup(lookup(&[("SERVICE_BUS_ENABLED", "maybe")])),
            Err(CoreError::Configuration(_))
        );
        assert_matches!(
            ServiceBusConfig::from_lookup(lookup(&[(
                "SERVICE_BUS_REQUEST_TIMEOUT_SECS",
                "soon"
            )])),
            Err(CoreError::Configuration(_))
        );
    }

    #[test]
    fn major_version_reads_leading_integer() {
        let mut config = ServiceBusConfig::default();
        for (version, major) in [("1.0.0", 1), ("2.0.0", 2), ("10", 10), ("v2", 0), ("", 0)] {
            config.version = version.into();
            assert_eq!(config.major_version(), major, "version {version:?}");
        }
    }

    #[test]
    fn tenant_follows_version() {
        let legacy = http_config("1.0.0");
        assert_eq!(legacy.tenant_field(), "venture_config_id");
        assert_eq!(legacy.tenant_id(), Some("V1"));

        let current = http_config("2.0.0");
        assert_eq!(current.tenant_field(), "node_id");
        assert_eq!(current.tenant_id(), Some("123456789"));
    }

    #[test]
    fn token_key_is_deterministic_per_tenant() {
        let a = http_config("2.0.0");
        let b = http_config("2.0.0");
        assert_eq!(a.token_key(), b.token_key());

        let mut other = http_config("2.0.0");
        other.node_id = Some("987654321".into());
        assert_ne!(a.token_key(), other.token_key());

        let legacy = http_config("1.0.0");
        assert_ne!(a.token_key(), legacy.token_key());
    }

    #[test]
    fn token_key_matches_prefixed_digest() {
        let config = http_config("2.0.0");
        assert_eq!(
            config.token_key(),
            sha256_hex(b"service-bus-token123456789")
        );
    }

    #[test]
    fn token_tag_changes_key() {
        let plain = http_config("2.0.0");
        let mut tagged = http_config("2.0.0");
        tagged.token_tag = Some("staging".into());
        assert_ne!(plain.token_key(), tagged.token_key());
        assert_eq!(
            tagged.token_key(),
            sha256_hex(b"service-bus-token123456789:staging")
        );
    }

    #[test]
    fn should_report_respects_dont_report() {
        let config = ServiceBusConfig {
            dont_report: vec!["Quiet".into()],
            ..Default::default()
        };
        assert!(!config.should_report("Quiet"));
        assert!(config.should_report("Loud"));
    }

    #[test]
    fn validate_for_http_requires_credentials_when_enabled() {
        assert!(http_config("2.0.0").validate_for_http().is_ok());

        let mut missing = http_config("2.0.0");
        missing.password = None;
        let err = missing.validate_for_http().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: password is required");

        let mut no_tenant = http_config("1.0.0");
        no_tenant.venture_config_id = None;
        let err = no_tenant.validate_for_http().unwrap_err();
        assert!(err.to_string().contains("venture_config_id"));
    }

    #[test]
    fn validate_for_http_skips_credentials_when_disabled() {
        let config = ServiceBusConfig::default();
        assert!(config.validate_for_http().is_ok());
    }

    #[test]
    fn validate_for_http_rejects_relative_endpoint() {
        let mut config = http_config("2.0.0");
        config.endpoint = Some("bus.example.com".into());
        assert_matches!(config.validate_for_http(), Err(CoreError::Configuration(_)));
    }

    #[test]
    fn validate_for_http_rejects_endpoint_without_host() {
        for endpoint in ["http://", "https:///v1", "https://:8080/v1", "ftp://bus.example.com"] {
            let mut config = http_config("2.0.0");
            config.endpoint = Some(endpoint.into());
            assert_matches!(
                config.validate_for_http(),
                Err(CoreError::Configuration(_)),
                "endpoint {endpoint:?}"
            );
        }

        let mut config = http_config("2.0.0");
        config.endpoint = Some("http://localhost:8080".into());
        assert!(config.validate_for_http().is_ok());
    }

    #[test]
    fn validate_for_queue_requires_sqs_settings() {
        let mut config = http_config("2.0.0");
        assert_matches!(config.validate_for_queue(), Err(CoreError::Configuration(_)));

        config.sqs = Some(SqsConfig {
            queue_url: "https://sqs.eu-west-1.amazonaws.com/1/bus".into(),
            region: String::new(),
            ..Default::default()
        });
        let err = config.validate_for_queue().unwrap_err();
        assert!(err.to_string().contains("sqs.region"));

        config.sqs.as_mut().unwrap().region = "eu-west-1".into();
        assert!(config.validate_for_queue().unwrap().is_some());

        config.sqs.as_mut().unwrap().key = Some("AKIA".into());
        assert_matches!(config.validate_for_queue(), Err(CoreError::Configuration(_)));
    }

    #[test]
    fn validate_for_queue_allows_disabled_without_sqs() {
        let config = ServiceBusConfig::default();
        assert!(config.validate_for_queue().unwrap().is_none());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ServiceBusConfig = serde_json::from_value(serde_json::json!({
            "enabled": true,
            "node_id": "123456789",
            "username": "username",
            "password": "password",
            "endpoint": "https://bus.example.com/v1/",
            "sqs": { "queue_url": "q", "region": "eu-west-1" }
        }))
        .unwrap();
        assert_eq!(config.version, DEFAULT_VERSION);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.sqs.unwrap().key.is_none());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = http_config("2.0.0");
        config.sqs = Some(SqsConfig {
            secret: Some("top-secret".into()),
            ..Default::default()
        });
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("\"password\""));
        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
