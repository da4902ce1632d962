//! Credential adapters handing access tokens to the Graph client.
//!
//! [`DirectTokenCredential`] re-resolves its [`Token`] on every request and
//! refuses to hand out a token that is already expired. [`CachedCredential`]
//! is an opt-in layer that reuses a token until it nears expiry and lets only
//! one refresh run at a time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use crate::token::{AccessToken, Token};
use crate::{CoreError, Result};

/// Default margin before expiry at which [`CachedCredential`] refreshes.
pub const DEFAULT_REFRESH_WINDOW_SECS: i64 = 300;

/// The authentication interface the Graph client consumes.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Retrieve a current access token for `scopes`.
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken>;
}

#[async_trait]
impl<T> TokenCredential for Arc<T>
where
    T: TokenCredential + ?Sized,
{
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
        (**self).get_token(scopes).await
    }
}

/// Adapts a [`Token`] to [`TokenCredential`], resolving it on every call.
#[derive(Debug, Clone)]
pub struct DirectTokenCredential {
    token: Token,
    connection_name: Option<String>,
}

impl DirectTokenCredential {
    /// Create a credential for `token`, optionally tagged with the OAuth
    /// connection that issued it.
    #[must_use]
    pub fn new(token: impl Into<Token>, connection_name: Option<String>) -> Self {
        Self {
            token: token.into(),
            connection_name,
        }
    }

    /// The OAuth connection this token belongs to, if known.
    #[must_use]
    pub fn connection_name(&self) -> Option<&str> {
        self.connection_name.as_deref()
    }

    /// The wrapped token.
    #[must_use]
    pub const fn token(&self) -> &Token {
        &self.token
    }

    fn label(&self) -> &str {
        self.connection_name.as_deref().unwrap_or("default")
    }
}

#[async_trait]
impl TokenCredential for DirectTokenCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
        log::debug!(
            "resolving token for connection '{}' (scopes: {})",
            self.label(),
            scopes.join(" ")
        );

        let access = self.token.resolve().await.map_err(|e| match e {
            CoreError::TokenResolution(_) | CoreError::TokenExpired { .. } => e,
            other => CoreError::TokenResolution(format!("connection '{}': {other}", self.label())),
        })?;

        if access.token.is_empty() {
            return Err(CoreError::TokenResolution(format!(
                "connection '{}' produced an empty token",
                self.label()
            )));
        }

        if access.is_expired_at(Utc::now()) {
            log::warn!(
                "token for connection '{}' expired at {}",
                self.label(),
                access.expires_at
            );
            return Err(CoreError::TokenExpired {
                expired_at: access.expires_at,
            });
        }

        Ok(access)
    }
}

/// Caches tokens from another credential per scope set.
///
/// A cached token is reused until it is within the refresh window of its
/// expiry. Each scope set has its own slot lock, held across the refresh, so
/// concurrent callers for the same scopes share one in-flight resolution while
/// other scope sets are served without waiting.
pub struct CachedCredential {
    inner: Arc<dyn TokenCredential>,
    refresh_window: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

type Slot = Arc<Mutex<Option<AccessToken>>>;

impl CachedCredential {
    /// Wrap `inner` with the default refresh window.
    #[must_use]
    pub fn new<C>(inner: C) -> Self
    where
        C: TokenCredential + 'static,
    {
        Self::from_arc(Arc::new(inner))
    }

    /// Wrap an already shared credential.
    #[must_use]
    pub fn from_arc(inner: Arc<dyn TokenCredential>) -> Self {
        Self {
            inner,
            refresh_window: Duration::seconds(DEFAULT_REFRESH_WINDOW_SECS),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Override the refresh window.
    #[must_use]
    pub const fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    /// Drop every cached token so the next call resolves again.
    pub async fn invalidate(&self) {
        self.slots.lock().await.clear();
    }

    async fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(key.to_string()).or_default())
    }
}

impl fmt::Debug for CachedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCredential")
            .field("refresh_window", &self.refresh_window)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenCredential for CachedCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
        let slot = self.slot(&scopes.join(" ")).await;
        let mut cached = slot.lock().await;

        if let Some(token) = cached.as_ref()
            && !token.expires_within(self.refresh_window, Utc::now())
        {
            return Ok(token.clone());
        }

        let fresh = self.inner.get_token(scopes).await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::jwt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn scopes() -> Vec<String> {
        vec!["https://graph.microsoft.com/.default".to_string()]
    }

    fn counting_token(calls: &Arc<AtomicUsize>, lifetime: Duration) -> Token {
        let counter = Arc::clone(calls);
        Token::from_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                Ok(AccessToken::new(format!("token-{n}"), Utc::now() + lifetime))
            }
        })
    }

    #[tokio::test]
    async fn direct_credential_fetches_on_every_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let credential = DirectTokenCredential::new(
            counting_token(&calls, Duration::minutes(30)),
            Some("graph".to_string()),
        );

        for _ in 0..3 {
            let access = credential.get_token(&scopes()).await.expect("token");
            assert!(access.expires_at > Utc::now());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(credential.connection_name(), Some("graph"));
    }

    #[tokio::test]
    async fn direct_credential_rejects_expired_tokens() {
        let expired_at = Utc::now() - Duration::seconds(5);
        let credential = DirectTokenCredential::new(
            Token::from_fn(move || async move { Ok(AccessToken::new("stale", expired_at)) }),
            None,
        );

        match credential.get_token(&scopes()).await {
            Err(CoreError::TokenExpired { expired_at: at }) => assert_eq!(at, expired_at),
            other => panic!("expected TokenExpired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn direct_credential_rejects_expired_literal_jwt() {
        let token = jwt(&serde_json::json!({ "exp": Utc::now().timestamp() - 60 }));
        let credential = DirectTokenCredential::new(token, None);
        assert!(matches!(
            credential.get_token(&scopes()).await,
            Err(CoreError::TokenExpired { .. })
        ));
    }

    #[tokio::test]
    async fn direct_credential_surfaces_provider_failure() {
        let credential = DirectTokenCredential::new(
            Token::from_fn(|| async { Err(CoreError::Api("503 from token service".to_string())) }),
            Some("graph".to_string()),
        );

        let err = credential.get_token(&scopes()).await.expect_err("should fail");
        match err {
            CoreError::TokenResolution(msg) => {
                assert!(msg.contains("graph"));
                assert!(msg.contains("503 from token service"));
            }
            other => panic!("expected TokenResolution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn direct_credential_rejects_empty_token() {
        let credential = DirectTokenCredential::new(
            Token::from_fn(|| async { Ok(AccessToken::new("", Utc::now() + Duration::hours(1))) }),
            None,
        );
        assert!(matches!(
            credential.get_token(&scopes()).await,
            Err(CoreError::TokenResolution(_))
        ));
    }

    #[tokio::test]
    async fn cached_credential_reuses_until_refresh_window() {
        let calls = Arc::new(AtomicUsize::new(0));
        let long_lived = CachedCredential::new(DirectTokenCredential::new(
            counting_token(&calls, Duration::hours(1)),
            None,
        ));

        let first = long_lived.get_token(&scopes()).await.expect("first");
        let second = long_lived.get_token(&scopes()).await.expect("second");
        assert_eq!(first.token, second.token);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        long_lived.invalidate().await;
        let third = long_lived.get_token(&scopes()).await.expect("third");
        assert_ne!(first.token, third.token);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cached_credential_refreshes_tokens_near_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let short_lived = CachedCredential::new(DirectTokenCredential::new(
            counting_token(&calls, Duration::seconds(60)),
            None,
        ));

        short_lived.get_token(&scopes()).await.expect("first");
        short_lived.get_token(&scopes()).await.expect("second");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cached_credential_single_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let credential = Arc::new(CachedCredential::new(DirectTokenCredential::new(
            counting_token(&calls, Duration::hours(1)),
            None,
        )));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let credential = Arc::clone(&credential);
                tokio::spawn(async move { credential.get_token(&scopes()).await })
            })
            .collect();

        for handle in handles {
            let access = handle.await.expect("join").expect("token");
            assert_eq!(access.token, "token-0");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Blocks resolution of the `slow` scope until released.
    #[derive(Debug, Default)]
    struct GatedCredential {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TokenCredential for GatedCredential {
        async fn get_token(&self, scopes: &[String]) -> Result<AccessToken> {
            if scopes.iter().any(|s| s == "slow") {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(AccessToken::new(scopes.join(" "), Utc::now() + Duration::hours(1)))
        }
    }

    #[tokio::test]
    async fn cached_scopes_are_served_during_another_refresh() {
        let gate = Arc::new(GatedCredential::default());
        let credential = Arc::new(CachedCredential::from_arc(Arc::clone(&gate) as Arc<dyn TokenCredential>));
        let fast = vec!["fast".to_string()];
        credential.get_token(&fast).await.expect("prime fast");

        let slow_task = {
            let credential = Arc::clone(&credential);
            tokio::spawn(async move { credential.get_token(&["slow".to_string()]).await })
        };
        gate.entered.notified().await;

        let access = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            credential.get_token(&fast),
        )
        .await
        .expect("fast scopes not blocked by slow refresh")
        .expect("fast token");
        assert_eq!(access.token, "fast");

        gate.release.notify_one();
        let slow = slow_task.await.expect("join").expect("slow token");
        assert_eq!(slow.token, "slow");
    }
}
