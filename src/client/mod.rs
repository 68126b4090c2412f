//! Resilient HTTP client
//!
//! [`ResilientClient`] runs every request through the same pipeline:
//!
//! 1. **Pre-send**: attach the current bearer token. Under
//!    [`RefreshPolicy::Proactive`] an expired token (or a refresh already in
//!    progress) is resolved before the request reaches the transport.
//! 2. **Send**: one attempt through the [`Transport`](crate::http::Transport),
//!    with the descriptor's current timeout.
//! 3. **Post-receive**: the [`RetryScheduler`](crate::retry::RetryScheduler)
//!    classifies the outcome. A 401 obtains a fresh token through the shared
//!    [`RefreshCoordinator`](crate::refresh::RefreshCoordinator) before the
//!    backoff delay; the request then re-enters at step 1.
//!
//! The caller sees either the successful response, unchanged, or the last
//! real failure.

mod pipeline;
mod types;

pub use pipeline::ResilientClient;
pub use types::{ClientConfig, ClientConfigBuilder, RefreshPolicy};
