//! Retry scheduling
//!
//! Retry state lives on a [`RequestDescriptor`] and is advanced by
//! [`RetryScheduler::classify_and_schedule`], which turns the outcome of one
//! attempt into a [`Decision`]. The scheduler never sends anything itself;
//! the client loop honors the decision.
//!
//! # Policy
//!
//! - Success is always terminal.
//! - Once `max_retry_count` retries have been made, every failure is terminal.
//! - Only statuses in `retryable_statuses` are retried. A 408 also doubles
//!   the per-attempt timeout; a 401 asks for a token refresh first.
//! - The delay starts at `initial_delay` and is multiplied by
//!   `backoff_factor` after each retry.

mod scheduler;
mod types;

pub use scheduler::RetryScheduler;
pub use types::{Decision, Outcome, RequestDescriptor, RetryPolicy, DEFAULT_RETRYABLE_STATUSES};
