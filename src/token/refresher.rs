//! Token refresh capability
//!
//! Exchanges the current (stale) token for a new one. The coordinator calls
//! this at most once per refresh window; implementations should not retry.

use super::types::{RefreshedToken, Token};
use crate::error::{Error, Result};
use crate::types::StringMap;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use std::future::Future;
use tracing::warn;

/// Exchanges an old token for a new one
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Obtain a new token; `old_token` is whatever was stored, if anything
    async fn refresh(&self, old_token: Option<Token>) -> Result<RefreshedToken>;
}

/// Refresher backed by an async closure
pub struct FnRefresher<F>(pub F);

#[async_trait]
impl<F, Fut> TokenRefresher for FnRefresher<F>
where
    F: Fn(Option<Token>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RefreshedToken>> + Send,
{
    async fn refresh(&self, old_token: Option<Token>) -> Result<RefreshedToken> {
        (self.0)(old_token).await
    }
}

/// Refreshes by calling an HTTP endpoint with the old token
///
/// The old token is sent both as a bearer header and in the JSON body under
/// `token_field`. The new token is extracted from the response with
/// `token_path`; `expires_in_path` optionally points at a lifetime in
/// seconds.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: Client,
    url: String,
    method: Method,
    token_field: String,
    token_path: String,
    expires_in_path: Option<String>,
    extra_body: Map<String, Value>,
    headers: StringMap,
}

impl HttpTokenRefresher {
    /// Create a refresher posting to `url` and reading `$.access_token`
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            method: Method::POST,
            token_field: "token".to_string(),
            token_path: "$.access_token".to_string(),
            expires_in_path: Some("$.expires_in".to_string()),
            extra_body: Map::new(),
            headers: StringMap::new(),
        }
    }

    /// Set the HTTP method
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the body field carrying the old token
    #[must_use]
    pub fn token_field(mut self, field: impl Into<String>) -> Self {
        self.token_field = field.into();
        self
    }

    /// Set the path of the new token in the response
    #[must_use]
    pub fn token_path(mut self, path: impl Into<String>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Set the path of the lifetime (seconds) in the response
    #[must_use]
    pub fn expires_in_path(mut self, path: Option<String>) -> Self {
        self.expires_in_path = path;
        self
    }

    /// Add a static field to the request body
    #[must_use]
    pub fn body_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_body.insert(key.into(), value.into());
        self
    }

    /// Add a static header to the refresh request
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, old_token: Option<Token>) -> Result<RefreshedToken> {
        let mut body = self.extra_body.clone();
        if let Some(ref token) = old_token {
            body.insert(
                self.token_field.clone(),
                Value::String(token.as_str().to_string()),
            );
        }

        let mut req = self.client.request(self.method.clone(), &self.url).json(&body);
        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if let Some(ref token) = old_token {
            req = req.bearer_auth(token.as_str());
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::token_refresh(format!("Refresh request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::token_refresh(format!(
                "Refresh request failed with status {status}: {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::token_refresh(format!("Invalid refresh response: {e}")))?;

        let token = extract_jsonpath(&body, &self.token_path).ok_or_else(|| {
            Error::token_refresh(format!(
                "Could not extract token from path: {}",
                self.token_path
            ))
        })?;

        let lifetime = self
            .expires_in_path
            .as_deref()
            .and_then(|path| extract_jsonpath(&body, path))
            .and_then(|v| v.parse::<i64>().ok());

        let refreshed = match lifetime {
            Some(seconds) => RefreshedToken::expires_in(token, seconds),
            None => RefreshedToken::new(token, None),
        };
        if lifetime.is_some() && refreshed.expires_at.is_none() {
            warn!("Refresh response lifetime is out of range, expiry unknown");
        }

        Ok(refreshed)
    }
}

/// Extract a value from JSON using a simple JSONPath expression
/// Supports basic paths like "$.data.token" or "data.token"
pub fn extract_jsonpath(value: &Value, path: &str) -> Option<String> {
    let path = path.strip_prefix("$.").unwrap_or(path);

    let mut current = value;
    for part in path.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
