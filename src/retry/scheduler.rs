//! Outcome classification and backoff

use super::types::{Decision, Outcome, RequestDescriptor, RetryPolicy};
use std::time::Duration;
use tracing::debug;

/// Status meaning the server gave up waiting for the request
const REQUEST_TIMEOUT: u16 = 408;

/// Status meaning the token was rejected
const UNAUTHORIZED: u16 = 401;

/// Turns attempt outcomes into retry decisions
#[derive(Debug, Clone, Default)]
pub struct RetryScheduler {
    policy: RetryPolicy,
}

impl RetryScheduler {
    /// Create a scheduler for the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Classify `outcome` and advance the descriptor's retry state
    ///
    /// The descriptor is only mutated when the decision is
    /// [`Decision::RetryAfter`].
    pub fn classify_and_schedule(
        &self,
        descriptor: &mut RequestDescriptor,
        outcome: &Outcome,
    ) -> Decision {
        if outcome.is_success() {
            return Decision::TerminalSuccess;
        }

        if descriptor.retry_count() >= self.policy.max_retry_count {
            debug!(
                "Retry budget exhausted after {} retries",
                descriptor.retry_count()
            );
            return Decision::TerminalFailure;
        }

        let (retryable, timed_out, unauthorized) = match outcome {
            Outcome::Response(response) => {
                let status = response.status();
                (
                    self.policy.is_retryable_status(status),
                    status == REQUEST_TIMEOUT,
                    status == UNAUTHORIZED,
                )
            }
            Outcome::Transport(e) => (self.policy.retry_transport_errors, e.is_timeout(), false),
        };

        if !retryable {
            return Decision::TerminalFailure;
        }

        let delay = self.cap(descriptor.delay());

        if let Some(ceiling) = self.policy.max_total_time {
            if descriptor.elapsed() + delay > ceiling {
                debug!("Retry would exceed total time limit of {ceiling:?}");
                return Decision::TerminalFailure;
            }
        }

        let next_delay = self.cap(delay.saturating_mul(self.policy.backoff_factor));
        descriptor.record_retry(next_delay, timed_out);

        Decision::RetryAfter {
            delay,
            refresh_token: unauthorized,
        }
    }

    fn cap(&self, delay: Duration) -> Duration {
        match self.policy.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}
