//! Token value types

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// Store key holding the bearer token
pub const AUTH_KEY: &str = "auth_key";

/// Store key holding the token expiry
pub const AUTH_EXPIRY_KEY: &str = "auth_expiry";

/// Opaque bearer credential
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw token value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the Authorization header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Result of a successful refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    /// The new token
    pub token: Token,
    /// When the new token expires, if known
    pub expires_at: Option<DateTime<Utc>>,
}

impl RefreshedToken {
    /// Create a refreshed token
    pub fn new(token: impl Into<Token>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Create a token that expires in N seconds from now
    ///
    /// A lifetime too large to represent leaves the expiry unknown.
    pub fn expires_in(token: impl Into<Token>, seconds: i64) -> Self {
        let expires_at = chrono::Duration::try_seconds(seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
        Self {
            token: token.into(),
            expires_at,
        }
    }
}

/// Parse a stored expiry: RFC 3339, or epoch milliseconds
pub(crate) fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::new("super-secret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_token_bearer() {
        assert_eq!(Token::from("abc").bearer(), "Bearer abc");
    }

    #[test]
    fn test_parse_expiry_rfc3339() {
        let parsed = parse_expiry("2030-01-01T00:00:00Z").unwrap();
        assert_eq!(parsed.timestamp(), 1_893_456_000);
    }

    #[test]
    fn test_parse_expiry_millis() {
        let parsed = parse_expiry("1893456000000").unwrap();
        assert_eq!(parsed.timestamp(), 1_893_456_000);
    }

    #[test]
    fn test_expires_in() {
        let refreshed = RefreshedToken::expires_in("t", 60);
        assert!(refreshed.expires_at.unwrap() > Utc::now());
    }

    #[test]
    fn test_expires_in_out_of_range_is_unknown() {
        assert!(RefreshedToken::expires_in("t", i64::MAX).expires_at.is_none());
        assert!(RefreshedToken::expires_in("t", i64::MIN).expires_at.is_none());
    }

    #[test]
    fn test_parse_expiry_garbage() {
        assert!(parse_expiry("next tuesday").is_none());
    }
}
