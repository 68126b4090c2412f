//! Single-flight token refresh

use crate::error::{Error, Result};
use crate::token::{RefreshedToken, Token, TokenGateway, TokenRefresher};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

/// Why a caller needs a fresh token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureSignal {
    /// The stored token failed the expiry check before sending
    Expired,
    /// The server answered 401 to a request carrying this token
    Rejected(Option<Token>),
}

/// Outcome fanned out to waiters; every waiter sees the same error value
type SharedOutcome = std::result::Result<Token, Arc<Error>>;

#[derive(Default)]
struct RefreshState {
    is_refreshing: bool,
    waiters: Vec<oneshot::Sender<SharedOutcome>>,
}

struct Inner {
    gateway: TokenGateway,
    refresher: Arc<dyn TokenRefresher>,
    state: Mutex<RefreshState>,
    refresh_timeout: Option<Duration>,
    refresh_count: AtomicU64,
}

/// Shared handle enforcing single-flight token refresh
///
/// Clones share the same state. The refresh itself runs in a spawned task,
/// so a caller that stops waiting never leaves other waiters stranded.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    /// Create a coordinator
    pub fn new(gateway: TokenGateway, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self::with_timeout(gateway, refresher, None)
    }

    /// Create a coordinator that fails a refresh taking longer than `timeout`
    pub fn with_timeout(
        gateway: TokenGateway,
        refresher: Arc<dyn TokenRefresher>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                refresher,
                state: Mutex::new(RefreshState::default()),
                refresh_timeout: timeout,
                refresh_count: AtomicU64::new(0),
            }),
        }
    }

    /// Gateway used to read and store tokens
    pub fn gateway(&self) -> &TokenGateway {
        &self.inner.gateway
    }

    /// Number of refresh calls made so far
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_count.load(Ordering::SeqCst)
    }

    /// Obtain a fresh token
    ///
    /// Joins the outstanding refresh if there is one. Otherwise, if the
    /// stored token already differs from what triggered `signal` (another
    /// refresh settled in the meantime), returns the stored token. Otherwise
    /// starts a refresh and waits for it.
    pub async fn ensure_fresh_token(&self, signal: FailureSignal) -> Result<Token> {
        if let Some(rx) = self.join_outstanding().await {
            return Self::receive(rx).await;
        }

        if let Some(token) = self.already_fresh(&signal).await {
            debug!("Token was refreshed by another request, reusing it");
            return Ok(token);
        }

        let rx = self.join_or_start().await;
        Self::receive(rx).await
    }

    /// Wait for the outstanding refresh, if any
    ///
    /// Returns `None` immediately when no refresh is running.
    pub async fn await_outstanding(&self) -> Option<Result<Token>> {
        let rx = self.join_outstanding().await?;
        Some(Self::receive(rx).await)
    }

    async fn join_outstanding(&self) -> Option<oneshot::Receiver<SharedOutcome>> {
        let mut state = self.inner.state.lock().await;
        if !state.is_refreshing {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        debug!(
            "Refresh in progress, queued as waiter #{}",
            state.waiters.len()
        );
        Some(rx)
    }

    async fn join_or_start(&self) -> oneshot::Receiver<SharedOutcome> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.inner.state.lock().await;
        state.waiters.push(tx);
        if !state.is_refreshing {
            state.is_refreshing = true;
            drop(state);
            tokio::spawn(run_refresh(Arc::clone(&self.inner)));
        }
        rx
    }

    async fn already_fresh(&self, signal: &FailureSignal) -> Option<Token> {
        let gateway = &self.inner.gateway;
        let current = gateway.current_token().await?;
        match signal {
            FailureSignal::Expired => {
                if gateway.is_expired(&current).await {
                    None
                } else {
                    Some(current)
                }
            }
            FailureSignal::Rejected(Some(rejected)) if *rejected == current => None,
            FailureSignal::Rejected(_) => Some(current),
        }
    }

    async fn receive(rx: oneshot::Receiver<SharedOutcome>) -> Result<Token> {
        match rx.await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(shared)) => Err(Error::shared_refresh_failure(&shared)),
            Err(_) => Err(Error::token_refresh("refresh task ended without a result")),
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_count", &self.refresh_count())
            .field("refresh_timeout", &self.inner.refresh_timeout)
            .finish_non_exhaustive()
    }
}

/// Drive one refresh to completion and settle every waiter
async fn run_refresh(inner: Arc<Inner>) {
    let old_token = inner.gateway.current_token().await;
    inner.refresh_count.fetch_add(1, Ordering::SeqCst);
    info!("Refreshing auth token");

    let outcome = call_refresher(&inner, old_token).await;

    let outcome: SharedOutcome = match outcome {
        Ok(refreshed) => {
            if let Err(e) = inner.gateway.store_token(&refreshed).await {
                warn!("Failed to persist refreshed token: {e}");
            }
            Ok(refreshed.token)
        }
        Err(e) => {
            warn!("Token refresh failed: {e}");
            Err(Arc::new(e))
        }
    };

    // Reset and drain under one lock: a caller arriving after this point
    // starts a new refresh instead of joining a drained queue.
    let waiters = {
        let mut state = inner.state.lock().await;
        state.is_refreshing = false;
        std::mem::take(&mut state.waiters)
    };

    debug!("Settling {} refresh waiter(s)", waiters.len());
    for waiter in waiters {
        // The receiver may have been dropped by a cancelled request
        let _ = waiter.send(outcome.clone());
    }
}

async fn call_refresher(
    inner: &Inner,
    old_token: Option<Token>,
) -> Result<RefreshedToken> {
    let call = AssertUnwindSafe(inner.refresher.refresh(old_token)).catch_unwind();

    let result = match inner.refresh_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                return Err(Error::token_refresh(format!(
                    "refresh timed out after {limit:?}"
                )))
            }
        },
        None => call.await,
    };

    result.unwrap_or_else(|_| Err(Error::token_refresh("refresher panicked")))
}
