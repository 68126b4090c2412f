//! Request pipeline
//!
//! Drives a request descriptor through pre-send, send and post-receive until
//! the retry scheduler reaches a terminal decision.

use super::types::{ClientConfig, RefreshPolicy};
use crate::error::{Error, Result};
use crate::http::{
    HttpRequest, HttpResponse, RateLimiter, ReqwestTransport, Transport, AUTHORIZATION,
};
use crate::refresh::{FailureSignal, RefreshCoordinator};
use crate::retry::{Decision, Outcome, RequestDescriptor, RetryScheduler};
use crate::token::{Token, TokenGateway, TokenRefresher, TokenStore};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// HTTP client with bearer token refresh and bounded retries
pub struct ResilientClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    scheduler: RetryScheduler,
    auth: Option<RefreshCoordinator>,
    rate_limiter: Option<RateLimiter>,
}

impl ResilientClient {
    /// Create a client over reqwest, without authentication
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over a custom transport, without authentication
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        let scheduler = RetryScheduler::new(config.retry.clone());

        Self {
            config,
            transport,
            scheduler,
            auth: None,
            rate_limiter,
        }
    }

    /// Enable bearer authentication with the default expiry check
    #[must_use]
    pub fn with_auth(
        self,
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        self.with_gateway(TokenGateway::new(store), refresher)
    }

    /// Enable bearer authentication through a custom gateway
    #[must_use]
    pub fn with_gateway(self, gateway: TokenGateway, refresher: Arc<dyn TokenRefresher>) -> Self {
        let coordinator =
            RefreshCoordinator::with_timeout(gateway, refresher, self.config.refresh_timeout);
        self.with_coordinator(coordinator)
    }

    /// Enable bearer authentication through an existing coordinator
    ///
    /// Clients sharing a coordinator share its single-flight refresh.
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: RefreshCoordinator) -> Self {
        self.auth = Some(coordinator);
        self
    }

    /// The refresh coordinator, if authentication is enabled
    pub fn coordinator(&self) -> Option<&RefreshCoordinator> {
        self.auth.as_ref()
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.send(HttpRequest::get(url)).await
    }

    /// Make a POST request with a JSON body
    pub async fn post(&self, url: &str, body: &Value) -> Result<HttpResponse> {
        self.send(HttpRequest::post(url).json(body)?).await
    }

    /// Make a PUT request with a JSON body
    pub async fn put(&self, url: &str, body: &Value) -> Result<HttpResponse> {
        self.send(HttpRequest::new(reqwest::Method::PUT, url).json(body)?)
            .await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str) -> Result<HttpResponse> {
        self.send(HttpRequest::new(reqwest::Method::DELETE, url))
            .await
    }

    /// Make a GET request and parse JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.request_json(HttpRequest::get(url)).await
    }

    /// Make a request and parse JSON response
    pub async fn request_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let response = self.send(request).await?;
        response.json()
    }

    /// Send a request through the pipeline
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.send_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Send a request, giving up with [`Error::Cancelled`] once `cancel` fires
    ///
    /// Cancellation is observed while sending, while waiting for a token
    /// refresh and during backoff. A refresh already started keeps running
    /// for the other requests waiting on it.
    pub async fn send_with_cancel(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let target = self.prepare(request)?;
        let mut descriptor =
            RequestDescriptor::new(target, &self.config.retry, self.config.default_timeout);

        loop {
            let sent_token = self.attach_token(&mut descriptor, cancel).await?;

            if let Some(ref limiter) = self.rate_limiter {
                cancellable(cancel, limiter.acquire()).await?;
            }

            debug!(
                "{} {} (attempt {}/{}, timeout {:?})",
                descriptor.target().method,
                descriptor.target().url,
                descriptor.retry_count() + 1,
                self.config.retry.max_retry_count + 1,
                descriptor.timeout()
            );

            let outcome: Outcome = cancellable(
                cancel,
                self.transport
                    .send(descriptor.target(), descriptor.timeout()),
            )
            .await?
            .into();

            match self.scheduler.classify_and_schedule(&mut descriptor, &outcome) {
                Decision::TerminalSuccess => return outcome.into_result(),
                Decision::TerminalFailure => {
                    debug!(
                        "Request to {} failed after {} retries",
                        descriptor.target().url,
                        descriptor.retry_count()
                    );
                    return outcome.into_result();
                }
                Decision::RetryAfter {
                    delay,
                    refresh_token,
                } => {
                    warn!(
                        "Request failed with {}, attempt {}/{}, retrying in {:?}",
                        describe(&outcome),
                        descriptor.retry_count(),
                        self.config.retry.max_retry_count + 1,
                        delay
                    );

                    if refresh_token {
                        if let Some(ref auth) = self.auth {
                            let signal = FailureSignal::Rejected(sent_token);
                            let token =
                                cancellable(cancel, auth.ensure_fresh_token(signal)).await??;
                            descriptor.set_refreshed_token(token);
                        }
                    }

                    cancellable(cancel, tokio::time::sleep(delay)).await?;
                }
            }
        }
    }

    /// Pre-send hook: resolve the token for this attempt and write the header
    async fn attach_token(
        &self,
        descriptor: &mut RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Option<Token>> {
        let Some(ref auth) = self.auth else {
            return Ok(None);
        };

        let token = match descriptor.take_refreshed_token() {
            Some(token) => Some(token),
            None => match self.config.refresh_policy {
                RefreshPolicy::Reactive => auth.gateway().current_token().await,
                RefreshPolicy::Proactive => self.proactive_token(auth, cancel).await?,
            },
        };

        if let Some(ref token) = token {
            descriptor
                .target_mut()
                .set_header(AUTHORIZATION, token.bearer());
        }

        Ok(token)
    }

    async fn proactive_token(
        &self,
        auth: &RefreshCoordinator,
        cancel: &CancellationToken,
    ) -> Result<Option<Token>> {
        // Requests arriving mid-refresh wait for it instead of sending a
        // token that is about to be replaced
        if let Some(result) = cancellable(cancel, auth.await_outstanding()).await? {
            return result.map(Some);
        }

        let gateway = auth.gateway();
        match gateway.current_token().await {
            Some(token) if gateway.is_expired(&token).await => {
                debug!("Stored token is expired, refreshing before sending");
                let fresh =
                    cancellable(cancel, auth.ensure_fresh_token(FailureSignal::Expired)).await??;
                Ok(Some(fresh))
            }
            other => Ok(other),
        }
    }

    /// Resolve the URL and apply default headers
    fn prepare(&self, mut request: HttpRequest) -> Result<HttpRequest> {
        request.url = self.build_url(&request.url);
        Url::parse(&request.url)?;

        for (key, value) in &self.config.default_headers {
            if request.header_value(key).is_none() {
                request.set_header(key.as_str(), value.as_str());
            }
        }

        Ok(request)
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("config", &self.config)
            .field("has_auth", &self.auth.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Run `fut` unless `cancel` fires first
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        output = fut => Ok(output),
    }
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Response(response) => response.status().to_string(),
        Outcome::Transport(e) => format!("transport error ({e})"),
    }
}
