//! Error types for resilient-http
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Callers only ever see the last real outcome of a request: a transport
//! failure, an HTTP status with its body, or a token refresh failure.
//! Retry bookkeeping never leaks into these values.

use crate::http::TransportError;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// The main error type for resilient-http
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Token Errors
    // ============================================================================
    /// `source` is shared by every request that waited on the same refresh
    #[error("Token refresh failed: {message}")]
    TokenRefresh {
        message: String,
        #[source]
        source: Option<Arc<Error>>,
    },

    #[error("Token store error: {message}")]
    TokenStore { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The body is kept exactly as received
    #[error("HTTP {status}: {}", String::from_utf8_lossy(.body))]
    HttpStatus { status: u16, body: Bytes },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Request cancelled")]
    Cancelled,

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a token refresh error
    pub fn token_refresh(message: impl Into<String>) -> Self {
        Self::TokenRefresh {
            message: message.into(),
            source: None,
        }
    }

    /// Rebuild a refresh failure for one of the requests that waited on it
    ///
    /// Refresh errors keep their message and cause. Any other error becomes
    /// the shared cause of a new refresh error.
    pub fn shared_refresh_failure(shared: &Arc<Error>) -> Self {
        match shared.as_ref() {
            Error::TokenRefresh { message, source } => Self::TokenRefresh {
                message: message.clone(),
                source: source.clone(),
            },
            other => Self::TokenRefresh {
                message: other.to_string(),
                source: Some(Arc::clone(shared)),
            },
        }
    }

    /// Create a token store error
    pub fn token_store(message: impl Into<String>) -> Self {
        Self::TokenStore {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<Bytes>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// HTTP status carried by this error, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error came from the token refresh capability
    pub fn is_refresh_failure(&self) -> bool {
        matches!(self, Error::TokenRefresh { .. })
    }

    /// The error a refresher failed with, when it was not a refresh error itself
    pub fn refresh_cause(&self) -> Option<&Error> {
        match self {
            Error::TokenRefresh {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias for resilient-http
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Config {
                message: format!("{}: {}", message.into(), inner),
            }
        })
    }
}
