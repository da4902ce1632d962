//! Provider-backed tokens sourced from the token service.

use async_trait::async_trait;
use chrono::Utc;

use crate::oauth::client::UserTokenClient;
use crate::oauth::models::GetUserTokenParams;
use crate::token::{AccessToken, Token, TokenProvider};
use crate::{CoreError, Result};

/// Fetches the user's connection token from the token service on every use.
#[derive(Debug, Clone)]
pub struct UserTokenProvider {
    client: UserTokenClient,
    params: GetUserTokenParams,
}

impl UserTokenProvider {
    /// Create a provider for one user and connection.
    #[must_use]
    pub const fn new(client: UserTokenClient, params: GetUserTokenParams) -> Self {
        Self { client, params }
    }

    /// The connection this provider reads from.
    #[must_use]
    pub fn connection_name(&self) -> &str {
        &self.params.connection_name
    }

    /// Wrap into a [`Token`].
    #[must_use]
    pub fn into_token(self) -> Token {
        Token::from_provider(self)
    }
}

#[async_trait]
impl TokenProvider for UserTokenProvider {
    async fn fetch(&self) -> Result<AccessToken> {
        let response = self.client.get(&self.params).await?;
        if response.token.is_empty() {
            return Err(CoreError::TokenResolution(format!(
                "token service returned no token for connection '{}'",
                self.params.connection_name
            )));
        }

        let access = response.to_access_token(Utc::now());
        log::debug!(
            "fetched token for connection '{}' (expires {})",
            self.params.connection_name,
            access.expires_at
        );
        Ok(access)
    }
}
