//! Token gateway
//!
//! The only component that reads or writes persisted credentials.

use super::store::TokenStore;
use super::types::{parse_expiry, RefreshedToken, Token, AUTH_EXPIRY_KEY, AUTH_KEY};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Decides whether a token is expired
///
/// `stored_expiry` is whatever the store holds under `auth_expiry`.
pub trait ExpiryCheck: Send + Sync {
    /// Whether `token` should be refreshed before use
    fn is_expired(&self, token: &Token, stored_expiry: Option<DateTime<Utc>>) -> bool;
}

/// Compares the stored expiry with the current time
///
/// A token with no stored expiry is never considered expired.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredExpiry {
    skew: Duration,
}

impl StoredExpiry {
    /// Treat tokens as expired `skew` before their stored expiry
    pub fn with_skew(skew: Duration) -> Self {
        Self { skew }
    }
}

impl ExpiryCheck for StoredExpiry {
    fn is_expired(&self, _token: &Token, stored_expiry: Option<DateTime<Utc>>) -> bool {
        let Some(expires_at) = stored_expiry else {
            return false;
        };
        let skew = chrono::Duration::from_std(self.skew).unwrap_or(chrono::Duration::MAX);
        // A skew reaching past the representable range expires everything
        match Utc::now().checked_add_signed(skew) {
            Some(now) => now >= expires_at,
            None => true,
        }
    }
}

/// Never reports a token as expired (staleness is only detected by 401s)
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverExpires;

impl ExpiryCheck for NeverExpires {
    fn is_expired(&self, _token: &Token, _stored_expiry: Option<DateTime<Utc>>) -> bool {
        false
    }
}

/// Expiry predicate backed by a closure
pub struct FnExpiry<F>(pub F);

impl<F> ExpiryCheck for FnExpiry<F>
where
    F: Fn(&Token) -> bool + Send + Sync,
{
    fn is_expired(&self, token: &Token, _stored_expiry: Option<DateTime<Utc>>) -> bool {
        (self.0)(token)
    }
}

/// Reads and writes the stored token and evaluates its expiry
#[derive(Clone)]
pub struct TokenGateway {
    store: Arc<dyn TokenStore>,
    expiry: Arc<dyn ExpiryCheck>,
}

impl TokenGateway {
    /// Create a gateway using [`StoredExpiry`]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self::with_expiry(store, Arc::new(StoredExpiry::default()))
    }

    /// Create a gateway with a custom expiry predicate
    pub fn with_expiry(store: Arc<dyn TokenStore>, expiry: Arc<dyn ExpiryCheck>) -> Self {
        Self { store, expiry }
    }

    /// Current token, or `None` if absent or the store failed
    pub async fn current_token(&self) -> Option<Token> {
        match self.store.get(AUTH_KEY).await {
            Ok(value) => value.filter(|v| !v.is_empty()).map(Token::from),
            Err(e) => {
                warn!("Token store read failed, continuing without token: {e}");
                None
            }
        }
    }

    /// Stored expiry, if present and parseable
    pub async fn stored_expiry(&self) -> Option<DateTime<Utc>> {
        match self.store.get(AUTH_EXPIRY_KEY).await {
            Ok(value) => value.as_deref().and_then(parse_expiry),
            Err(e) => {
                warn!("Token store read failed for expiry: {e}");
                None
            }
        }
    }

    /// Whether `token` is expired according to the configured predicate
    pub async fn is_expired(&self, token: &Token) -> bool {
        let stored_expiry = self.stored_expiry().await;
        self.expiry.is_expired(token, stored_expiry)
    }

    /// Persist a refreshed token and its expiry
    ///
    /// A token without an expiry clears any stale stored expiry.
    pub async fn store_token(&self, refreshed: &RefreshedToken) -> Result<()> {
        self.store.set(AUTH_KEY, refreshed.token.as_str()).await?;
        match refreshed.expires_at {
            Some(expires_at) => {
                self.store
                    .set(AUTH_EXPIRY_KEY, &expires_at.to_rfc3339())
                    .await
            }
            None => self.store.remove(AUTH_EXPIRY_KEY).await,
        }
    }

    /// Remove the stored token and expiry
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(AUTH_KEY).await?;
        self.store.remove(AUTH_EXPIRY_KEY).await
    }
}

impl std::fmt::Debug for TokenGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGateway").finish_non_exhaustive()
    }
}
