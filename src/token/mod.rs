//! Token module
//!
//! Everything that touches persisted credentials lives here:
//!
//! - [`TokenStore`] - key/value persistence (`auth_key`, `auth_expiry`)
//! - [`TokenGateway`] - reads the current token and evaluates expiry
//! - [`TokenRefresher`] - the external capability that exchanges an old
//!   token for a new one
//!
//! The gateway treats store failures as "no token" rather than fatal.

mod gateway;
mod refresher;
mod store;
mod types;

pub use gateway::{ExpiryCheck, FnExpiry, NeverExpires, StoredExpiry, TokenGateway};
pub use refresher::{extract_jsonpath, FnRefresher, HttpTokenRefresher, TokenRefresher};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use types::{RefreshedToken, Token, AUTH_EXPIRY_KEY, AUTH_KEY};
pub(crate) use types::parse_expiry;
