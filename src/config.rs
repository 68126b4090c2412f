//! Configuration file support
//!
//! [`ClientSettings`] is the serialized form of the client configuration.
//! It is read from YAML or JSON and converted into a [`ClientConfig`].
//! Keys are snake_case; the camelCase names (`baseURL`, `maxRetryCount`,
//! ...) are accepted as aliases.
//!
//! ```yaml
//! base_url: https://api.example.com/
//! default_timeout_ms: 30000
//! max_retry_count: 2
//! initial_delay_ms: 1000
//! retryable_statuses: [401, 408, 500, 502, 503, 504, 522, 524]
//! refresh_policy: proactive
//! refresh:
//!   url: https://auth.example.com/token/refresh
//!   token_path: $.data.token
//! ```

use crate::client::{ClientConfig, RefreshPolicy};
use crate::error::{Error, Result, ResultExt};
use crate::http::RateLimiterConfig;
use crate::retry::{RetryPolicy, DEFAULT_RETRYABLE_STATUSES};
use crate::token::HttpTokenRefresher;
use crate::types::{OptionStringExt, StringMap};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Client Settings
// ============================================================================

/// Client configuration as loaded from a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Base URL for relative request paths
    #[serde(default, alias = "baseURL")]
    pub base_url: Option<String>,

    /// Timeout of the first attempt in milliseconds
    #[serde(default = "default_timeout_ms", alias = "defaultTimeoutMs")]
    pub default_timeout_ms: u64,

    /// Maximum retries after the first attempt
    #[serde(default = "default_max_retry_count", alias = "maxRetryCount")]
    pub max_retry_count: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_delay_ms", alias = "initialDelayMs")]
    pub initial_delay_ms: u64,

    /// Delay multiplier between retries
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,

    /// Cap for a single delay in milliseconds
    #[serde(default)]
    pub max_delay_ms: Option<u64>,

    /// Ceiling for all attempts of a request in milliseconds
    #[serde(default)]
    pub max_total_time_ms: Option<u64>,

    /// Statuses treated as transient
    #[serde(default = "default_retryable_statuses", alias = "retryableStatuses")]
    pub retryable_statuses: Vec<u16>,

    /// Retry when no response is received
    #[serde(default)]
    pub retry_transport_errors: bool,

    /// When to look for a stale token
    #[serde(default, alias = "refreshPolicy")]
    pub refresh_policy: RefreshPolicy,

    /// Timeout for a single token refresh in milliseconds
    #[serde(default)]
    pub refresh_timeout_ms: Option<u64>,

    /// Treat tokens as expired this many seconds early
    #[serde(default)]
    pub expiry_skew_seconds: u64,

    /// Extra default headers
    #[serde(default)]
    pub headers: StringMap,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Client-side rate limiting
    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,

    /// HTTP token refresh endpoint
    #[serde(default)]
    pub refresh: Option<RefresherSettings>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retry_count() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> u32 {
    2
}

fn default_retryable_statuses() -> Vec<u16> {
    DEFAULT_RETRYABLE_STATUSES.to_vec()
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            default_timeout_ms: default_timeout_ms(),
            max_retry_count: default_max_retry_count(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: None,
            max_total_time_ms: None,
            retryable_statuses: default_retryable_statuses(),
            retry_transport_errors: false,
            refresh_policy: RefreshPolicy::default(),
            refresh_timeout_ms: None,
            expiry_skew_seconds: 0,
            headers: StringMap::new(),
            user_agent: None,
            rate_limit: None,
            refresh: None,
        }
    }
}

impl ClientSettings {
    /// Parse settings from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read config file {}", path.display()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Check values that deserialize fine but make no sense
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == 0 {
            return Err(Error::invalid_value(
                "default_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.backoff_factor == 0 {
            return Err(Error::invalid_value(
                "backoff_factor",
                "must be at least 1",
            ));
        }

        if let Some(status) = self
            .retryable_statuses
            .iter()
            .find(|s| !(100..=599).contains(*s))
        {
            return Err(Error::invalid_value(
                "retryable_statuses",
                format!("{status} is not an HTTP status code"),
            ));
        }

        if let Some(ref base_url) = self.base_url {
            url::Url::parse(base_url)
                .map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
        }

        if let Some(ref refresh) = self.refresh {
            url::Url::parse(&refresh.url)
                .map_err(|e| Error::invalid_value("refresh.url", e.to_string()))?;
        }

        Ok(())
    }

    /// Expiry skew as a duration
    pub fn expiry_skew(&self) -> Duration {
        Duration::from_secs(self.expiry_skew_seconds)
    }

    /// Build the client configuration
    pub fn to_client_config(&self) -> ClientConfig {
        let mut config = ClientConfig {
            base_url: self.base_url.clone().none_if_empty(),
            default_timeout: Duration::from_millis(self.default_timeout_ms),
            retry: RetryPolicy {
                max_retry_count: self.max_retry_count,
                initial_delay: Duration::from_millis(self.initial_delay_ms),
                backoff_factor: self.backoff_factor,
                max_delay: self.max_delay_ms.map(Duration::from_millis),
                max_total_time: self.max_total_time_ms.map(Duration::from_millis),
                retryable_statuses: self.retryable_statuses.iter().copied().collect(),
                retry_transport_errors: self.retry_transport_errors,
            },
            refresh_policy: self.refresh_policy,
            rate_limit: self.rate_limit,
            refresh_timeout: self.refresh_timeout_ms.map(Duration::from_millis),
            ..ClientConfig::default()
        };

        for (key, value) in &self.headers {
            config.default_headers.insert(key.clone(), value.clone());
        }

        if let Some(agent) = self.user_agent.clone().none_if_empty() {
            config.user_agent = agent;
        }

        config
    }
}

// ============================================================================
// Refresher Settings
// ============================================================================

/// HTTP token refresh endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefresherSettings {
    /// Endpoint URL
    pub url: String,

    /// HTTP method
    #[serde(default = "default_refresh_method")]
    pub method: String,

    /// Body field carrying the old token
    #[serde(default = "default_token_field")]
    pub token_field: String,

    /// JSON path of the new token in the response
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// JSON path of the token lifetime in seconds
    #[serde(default = "default_expires_in_path")]
    pub expires_in_path: Option<String>,

    /// Static fields added to the request body
    #[serde(default)]
    pub body: Map<String, Value>,

    /// Static headers added to the request
    #[serde(default)]
    pub headers: StringMap,
}

fn default_refresh_method() -> String {
    "POST".to_string()
}

fn default_token_field() -> String {
    "token".to_string()
}

fn default_token_path() -> String {
    "$.access_token".to_string()
}

fn default_expires_in_path() -> Option<String> {
    Some("$.expires_in".to_string())
}

impl RefresherSettings {
    /// Build the refresher
    pub fn build(&self, client: reqwest::Client) -> Result<HttpTokenRefresher> {
        let method = reqwest::Method::from_bytes(self.method.to_uppercase().as_bytes())
            .map_err(|e| Error::invalid_value("refresh.method", e.to_string()))?;

        let mut refresher = HttpTokenRefresher::new(client, self.url.clone())
            .method(method)
            .token_field(self.token_field.clone())
            .token_path(self.token_path.clone())
            .expires_in_path(self.expires_in_path.clone());

        for (key, value) in &self.body {
            refresher = refresher.body_field(key.clone(), value.clone());
        }
        for (key, value) in &self.headers {
            refresher = refresher.header(key.clone(), value.clone());
        }

        Ok(refresher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let settings = ClientSettings::from_yaml_str("{}").unwrap();
        assert_eq!(settings, ClientSettings::default());

        let config = settings.to_client_config();
        assert_eq!(config.default_timeout, Duration::from_secs(30));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.refresh_policy, RefreshPolicy::Reactive);
    }

    #[test]
    fn test_yaml_settings() {
        let yaml = r#"
base_url: https://api.example.com/
default_timeout_ms: 10000
max_retry_count: 3
initial_delay_ms: 500
max_delay_ms: 4000
retryable_statuses: [503, 504]
refresh_policy: proactive
headers:
  X-Client: mobile
rate_limit:
  requests_per_second: 5
  burst_size: 2
refresh:
  url: https://auth.example.com/refresh
  token_path: $.data.token
  body:
    client_id: app
"#;
        let settings = ClientSettings::from_yaml_str(yaml).unwrap();
        let config = settings.to_client_config();

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com/"));
        assert_eq!(config.default_timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_retry_count, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(500));
        assert_eq!(config.retry.max_delay, Some(Duration::from_secs(4)));
        assert!(config.retry.is_retryable_status(503));
        assert!(!config.retry.is_retryable_status(401));
        assert_eq!(config.refresh_policy, RefreshPolicy::Proactive);
        assert_eq!(config.rate_limit, Some(RateLimiterConfig::new(5, 2)));
        assert_eq!(
            config.default_headers.get("X-Client"),
            Some(&"mobile".to_string())
        );
        assert!(config.default_headers.contains_key("Content-Type"));

        let refresh = settings.refresh.unwrap();
        assert_eq!(refresh.method, "POST");
        assert_eq!(refresh.token_path, "$.data.token");
        assert_eq!(refresh.expires_in_path.as_deref(), Some("$.expires_in"));
        assert!(refresh.build(reqwest::Client::new()).is_ok());
    }

    #[test]
    fn test_camel_case_aliases() {
        let json = r#"{
            "baseURL": "https://api.my_company.com/",
            "defaultTimeoutMs": 30000,
            "maxRetryCount": 2,
            "initialDelayMs": 1000,
            "retryableStatuses": [401, 500],
            "refreshPolicy": "reactive"
        }"#;
        let settings = ClientSettings::from_json_str(json).unwrap();

        assert_eq!(
            settings.base_url.as_deref(),
            Some("https://api.my_company.com/")
        );
        assert_eq!(settings.retryable_statuses, vec![401, 500]);
    }

    #[test]
    fn test_validation_errors() {
        let err = ClientSettings::from_yaml_str("backoff_factor: 0").unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "backoff_factor"));

        let err = ClientSettings::from_yaml_str("retryable_statuses: [42]").unwrap_err();
        assert!(err.to_string().contains("42"));

        let err = ClientSettings::from_yaml_str("base_url: not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "base_url"));

        let err = ClientSettings::from_yaml_str("default_timeout_ms: 0").unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_unknown_refresh_policy() {
        let err = ClientSettings::from_yaml_str("refresh_policy: sometimes").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("client.yaml");
        std::fs::write(&yaml_path, "max_retry_count: 5\n").unwrap();
        assert_eq!(
            ClientSettings::from_file(&yaml_path).unwrap().max_retry_count,
            5
        );

        let json_path = dir.path().join("client.json");
        std::fs::write(&json_path, r#"{"max_retry_count": 1}"#).unwrap();
        assert_eq!(
            ClientSettings::from_file(&json_path).unwrap().max_retry_count,
            1
        );

        assert!(ClientSettings::from_file(dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_refresher_invalid_method() {
        let settings = RefresherSettings {
            url: "https://auth.example.com".to_string(),
            method: "NOT A METHOD".to_string(),
            token_field: default_token_field(),
            token_path: default_token_path(),
            expires_in_path: None,
            body: Map::new(),
            headers: StringMap::new(),
        };
        assert!(settings.build(reqwest::Client::new()).is_err());
    }
}
