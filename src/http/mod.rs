//! HTTP transport module
//!
//! The resiliency layer never talks to the network directly. Every attempt
//! goes through a [`Transport`], which sends one request and reports either a
//! response (any status) or a [`TransportError`] when no response arrived.
//!
//! # Features
//!
//! - **Owned request/response values**: [`HttpRequest`] can be mutated between
//!   attempts (the Authorization header is rewritten after a refresh)
//! - **Reqwest transport**: [`ReqwestTransport`] is the default implementation
//! - **Throttling**: [`RateLimiter`] hands out one governor permit per attempt

mod rate_limit;
mod transport;
mod types;

pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use transport::{ReqwestTransport, Transport};
pub use types::{HttpRequest, HttpResponse, TransportError, TransportErrorKind, AUTHORIZATION};

#[cfg(test)]
mod tests;
