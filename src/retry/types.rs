//! Retry policy, descriptor and decision types

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, TransportError};
use crate::token::Token;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;

/// Statuses retried by default
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 8] = [401, 408, 500, 502, 503, 504, 522, 524];

/// Retry configuration shared by every request of a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retry_count: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_factor: u32,
    /// Upper bound for a single delay
    pub max_delay: Option<Duration>,
    /// Wall-clock ceiling for all attempts of one request
    pub max_total_time: Option<Duration>,
    /// Statuses treated as transient
    pub retryable_statuses: BTreeSet<u16>,
    /// Retry when no response was received at all
    pub retry_transport_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: 2,
            initial_delay: Duration::from_millis(1000),
            backoff_factor: 2,
            max_delay: None,
            max_total_time: None,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            retry_transport_errors: false,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retry_count: 0,
            ..Self::default()
        }
    }

    /// Whether `status` is in the retryable set
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

/// One logical request plus its retry bookkeeping
///
/// Created when the caller issues a request and mutated only by the
/// scheduler between attempts.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    target: HttpRequest,
    retry_count: u32,
    delay: Duration,
    timeout: Duration,
    started_at: Instant,
    refreshed_token: Option<Token>,
}

impl RequestDescriptor {
    /// Create a descriptor for the first attempt
    pub fn new(target: HttpRequest, policy: &RetryPolicy, timeout: Duration) -> Self {
        Self {
            target,
            retry_count: 0,
            delay: policy.initial_delay,
            timeout,
            started_at: Instant::now(),
            refreshed_token: None,
        }
    }

    /// The request as it will be sent
    pub fn target(&self) -> &HttpRequest {
        &self.target
    }

    /// Mutable access to the request (headers are rewritten before sending)
    pub fn target_mut(&mut self) -> &mut HttpRequest {
        &mut self.target
    }

    /// Retries made so far
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Delay that the next retry will wait
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Timeout for the next attempt
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time since the descriptor was created
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Remember a token obtained by a refresh for the next attempt only
    pub(crate) fn set_refreshed_token(&mut self, token: Token) {
        self.refreshed_token = Some(token);
    }

    /// Take the token remembered for this attempt
    pub(crate) fn take_refreshed_token(&mut self) -> Option<Token> {
        self.refreshed_token.take()
    }

    pub(crate) fn record_retry(&mut self, next_delay: Duration, double_timeout: bool) {
        self.retry_count += 1;
        self.delay = next_delay;
        if double_timeout {
            self.timeout = self.timeout.saturating_mul(2);
        }
    }
}

/// Result of one attempt
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A response was received (any status)
    Response(HttpResponse),
    /// No response was received
    Transport(TransportError),
}

impl Outcome {
    /// Status code, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Response(response) => Some(response.status()),
            Outcome::Transport(_) => None,
        }
    }

    /// Whether a 2xx response was received
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Response(response) if response.is_success())
    }

    /// Convert into what the caller receives
    pub fn into_result(self) -> Result<HttpResponse> {
        match self {
            Outcome::Response(response) if response.is_success() => Ok(response),
            Outcome::Response(response) => Err(response.into_error()),
            Outcome::Transport(e) => Err(Error::Transport(e)),
        }
    }
}

impl From<std::result::Result<HttpResponse, TransportError>> for Outcome {
    fn from(result: std::result::Result<HttpResponse, TransportError>) -> Self {
        match result {
            Ok(response) => Outcome::Response(response),
            Err(e) => Outcome::Transport(e),
        }
    }
}

/// What to do with an attempt's outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Return the response to the caller
    TerminalSuccess,
    /// Return the outcome to the caller as an error
    TerminalFailure,
    /// Wait `delay`, then resubmit the descriptor through the pipeline
    RetryAfter {
        /// How long to wait before the next attempt
        delay: Duration,
        /// Whether a fresh token must be obtained before waiting
        refresh_token: bool,
    },
}
