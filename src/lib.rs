//! # resilient-http
//!
//! A resiliency layer around an HTTP client for calling bearer-token
//! protected APIs.
//!
//! ## Features
//!
//! - **Bearer Authentication**: Attaches the stored token to every attempt
//! - **Single-Flight Refresh**: Concurrent 401s or expired tokens trigger one refresh
//! - **Bounded Retries**: Escalating backoff for transient statuses, with timeout doubling on 408
//! - **Proactive or Reactive**: Refresh before sending an expired token, or only after a rejection
//! - **Cancellation and Rate Limiting**: Per-request cancellation, optional client-side limits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resilient_http::{ClientConfig, MemoryTokenStore, ResilientClient, Result};
//! use resilient_http::token::HttpTokenRefresher;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::builder()
//!         .base_url("https://api.my_company.com/")
//!         .build();
//!
//!     let store = Arc::new(MemoryTokenStore::with_token("initial-token"));
//!     let refresher = Arc::new(HttpTokenRefresher::new(
//!         reqwest::Client::new(),
//!         "https://api.my_company.com/token/refresh",
//!     ));
//!
//!     let client = ResilientClient::new(config)?.with_auth(store, refresher);
//!     let items: serde_json::Value = client.get_json("/api/items").await?;
//!     println!("{items}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        ResilientClient                          │
//! │   pre-send (attach token) → send → post-receive (classify)      │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────────┬───────────────┴───────┬───────────────┬─────────┐
//! │    Token     │  RefreshCoordinator   │ RetryScheduler│  HTTP   │
//! ├──────────────┼───────────────────────┼───────────────┼─────────┤
//! │ TokenStore   │ single flight         │ backoff       │ reqwest │
//! │ ExpiryCheck  │ waiter fan-out        │ 408 timeouts  │ governor│
//! │ Refresher    │ dedup stale 401s      │ retry budget  │         │
//! └──────────────┴───────────────────────┴───────────────┴─────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
// Allow common clippy pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP transport and rate limiting
pub mod http;

/// Token storage, expiry checks and refreshers
pub mod token;

/// Single-flight token refresh
pub mod refresh;

/// Retry policy and scheduling
pub mod retry;

/// The resilient client pipeline
pub mod client;

/// Configuration files
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use client::{ClientConfig, ClientConfigBuilder, RefreshPolicy, ResilientClient};
pub use config::{ClientSettings, RefresherSettings};
pub use http::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
pub use refresh::{FailureSignal, RefreshCoordinator};
pub use retry::{Decision, RetryPolicy, RetryScheduler};
pub use token::{
    FileTokenStore, MemoryTokenStore, RefreshedToken, Token, TokenGateway, TokenRefresher,
    TokenStore,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
