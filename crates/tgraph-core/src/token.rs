//! Bearer tokens as either a literal string or an on-demand provider.
//!
//! A literal token is simple but goes stale. A provider token is re-fetched
//! every time it is resolved and carries the exact expiration reported by
//! whoever issued it, so callers never have to guess when to refresh.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;

use crate::{CoreError, Result};

/// Lifetime assumed for a literal token whose expiry cannot be read.
pub const LITERAL_TOKEN_TTL_SECS: i64 = 3600;

/// A resolved access token and the instant it stops being valid.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The bearer token value.
    pub token: String,
    /// Expiration instant.
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token with an explicit expiration.
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Build an access token from a JWT, taking the expiry from its `exp` claim.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a JWT or has no `exp` claim.
    pub fn from_jwt(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let claims = TokenClaims::decode(&token)?;
        Ok(Self {
            token,
            expires_at: claims.expires_at,
        })
    }

    /// Build an access token from a literal string.
    ///
    /// JWTs keep their own expiry; opaque strings are assumed valid for
    /// [`LITERAL_TOKEN_TTL_SECS`] from `now`.
    #[must_use]
    pub fn from_literal(token: impl Into<String>, now: DateTime<Utc>) -> Self {
        let token = token.into();
        match TokenClaims::decode(&token) {
            Ok(claims) => Self {
                token,
                expires_at: claims.expires_at,
            },
            Err(e) => {
                log::trace!("literal token is not a readable JWT ({e}), assuming default lifetime");
                Self {
                    token,
                    expires_at: now + Duration::seconds(LITERAL_TOKEN_TTL_SECS),
                }
            }
        }
    }

    /// Whether the token is no longer valid at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the token expires within `window` of `now`.
    #[must_use]
    pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= window
    }

    /// Time left until expiry (negative once expired).
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Claims read from a JWT payload. The signature is not verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Tenant ID (`tid`).
    pub tenant_id: Option<String>,
    /// Object ID of the principal (`oid`).
    pub object_id: Option<String>,
    /// User principal name (`upn`, `unique_name` or `preferred_username`).
    pub user_principal_name: Option<String>,
    /// Audience (`aud`), first entry when it is a list.
    pub audience: Option<String>,
    /// Expiration (`exp`).
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    exp: Option<i64>,
    tid: Option<String>,
    oid: Option<String>,
    upn: Option<String>,
    unique_name: Option<String>,
    preferred_username: Option<String>,
    aud: Option<serde_json::Value>,
}

impl TokenClaims {
    /// Decode the payload of a JWT.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Auth`] if the token is not three dot-separated
    /// parts, the payload is not base64 JSON, or `exp` is missing.
    pub fn decode(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(CoreError::Auth(
                "invalid JWT format - expected 3 parts".to_string(),
            ));
        }

        let payload = decode_segment(parts[1])?;
        let raw: RawClaims = serde_json::from_slice(&payload)
            .map_err(|e| CoreError::Auth(format!("parsing claims: {e}")))?;

        let exp = raw
            .exp
            .ok_or_else(|| CoreError::Auth("missing exp claim".to_string()))?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| CoreError::Auth(format!("exp claim out of range: {exp}")))?;

        let audience = match raw.aud {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .find_map(|v| v.as_str().map(String::from)),
            _ => None,
        };

        Ok(Self {
            tenant_id: raw.tid,
            object_id: raw.oid,
            user_principal_name: raw.upn.or(raw.unique_name).or(raw.preferred_username),
            audience,
            expires_at,
        })
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>> {
    use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};

    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| CoreError::Auth(format!("base64 decode: {e}")))
}

/// Something that can produce a fresh access token on demand.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch a token. Called once per resolution; implementations must not
    /// return a token they know to be expired.
    async fn fetch(&self) -> Result<AccessToken>;
}

struct FnTokenProvider<F>(F);

#[async_trait]
impl<F, Fut> TokenProvider for FnTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<AccessToken>> + Send,
{
    async fn fetch(&self) -> Result<AccessToken> {
        (self.0)().await
    }
}

/// A bearer credential: a literal value or a provider invoked on each use.
#[derive(Clone)]
pub enum Token {
    /// A fixed token string.
    Literal(String),
    /// A provider asked for a fresh token every time.
    Provider(Arc<dyn TokenProvider>),
}

impl Token {
    /// Wrap a literal token string.
    #[must_use]
    pub fn literal(token: impl Into<String>) -> Self {
        Self::Literal(token.into())
    }

    /// Wrap a [`TokenProvider`].
    #[must_use]
    pub fn from_provider<P>(provider: P) -> Self
    where
        P: TokenProvider + 'static,
    {
        Self::Provider(Arc::new(provider))
    }

    /// Wrap an async closure returning an [`AccessToken`].
    #[must_use]
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AccessToken>> + Send + 'static,
    {
        Self::Provider(Arc::new(FnTokenProvider(f)))
    }

    /// Whether this is a literal token.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Resolve to a concrete access token.
    ///
    /// # Errors
    ///
    /// Propagates whatever the provider returns; literals never fail here.
    pub async fn resolve(&self) -> Result<AccessToken> {
        match self {
            Self::Literal(value) => Ok(AccessToken::from_literal(value.clone(), Utc::now())),
            Self::Provider(provider) => provider.fetch().await,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(_) => f.write_str("Token::Literal(<redacted>)"),
            Self::Provider(_) => f.write_str("Token::Provider(..)"),
        }
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}
