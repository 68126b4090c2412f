//! Transport capability and its reqwest implementation

use super::types::{HttpRequest, HttpResponse, TransportError};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Sends a single attempt of a request
///
/// Implementations must honor `timeout` for the attempt and must return
/// `Ok` for every response received, whatever its status. `Err` means no
/// response arrived at all.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one attempt
    async fn send(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// Transport backed by a `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the given user agent
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(TransportError::from)?;
        Ok(Self::with_client(client))
    }

    /// Wrap an existing client, keeping its default headers, proxy and TLS setup
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let mut req = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(timeout);

        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        if let Some(ref body) = request.body {
            req = req.body(body.clone());
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!("{} {} -> {}", request.method, request.url, status);
        Ok(HttpResponse::new(status, headers, body))
    }
}
