//! Client configuration

use crate::http::RateLimiterConfig;
use crate::retry::RetryPolicy;
use crate::types::StringMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When the client looks for a stale token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Check expiry before sending and refresh first if needed
    Proactive,
    /// Send whatever token is stored and refresh on a 401
    #[default]
    Reactive,
}

/// Configuration for the resilient client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,
    /// Timeout of the first attempt
    pub default_timeout: Duration,
    /// Retry policy
    pub retry: RetryPolicy,
    /// Token refresh policy
    pub refresh_policy: RefreshPolicy,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Upper bound for a single token refresh
    pub refresh_timeout: Option<Duration>,
    /// Default headers for all requests
    pub default_headers: StringMap,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut default_headers = StringMap::new();
        default_headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self {
            base_url: None,
            default_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            refresh_policy: RefreshPolicy::default(),
            rate_limit: None,
            refresh_timeout: None,
            default_headers,
            user_agent: format!("resilient-http/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for client config
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the timeout of the first attempt
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Replace the whole retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set max retries
    pub fn max_retry_count(mut self, retries: u32) -> Self {
        self.config.retry.max_retry_count = retries;
        self
    }

    /// Set the delay before the first retry
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.retry.initial_delay = delay;
        self
    }

    /// Set the cap for a single delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.retry.max_delay = Some(delay);
        self
    }

    /// Set the wall-clock ceiling for all attempts of a request
    pub fn max_total_time(mut self, limit: Duration) -> Self {
        self.config.retry.max_total_time = Some(limit);
        self
    }

    /// Replace the set of retryable statuses
    pub fn retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.config.retry.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Retry when no response is received
    pub fn retry_transport_errors(mut self, enabled: bool) -> Self {
        self.config.retry.retry_transport_errors = enabled;
        self
    }

    /// Set the refresh policy
    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.config.refresh_policy = policy;
        self
    }

    /// Set the timeout for a single token refresh
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.config.refresh_timeout = Some(timeout);
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
