//! Request parameters and response models for the token service.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::token::AccessToken;
use crate::{CoreError, Result};

/// A user token held by the token service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Channel the token was issued for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// OAuth connection name.
    #[serde(default)]
    pub connection_name: String,
    /// The user token.
    #[serde(default)]
    pub token: String,
    /// Expiration as reported by the service (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

impl TokenResponse {
    /// Convert to an [`AccessToken`] with the most exact expiry available:
    /// the reported `expiration`, else the JWT `exp`, else the literal default.
    #[must_use]
    pub fn to_access_token(&self, now: DateTime<Utc>) -> AccessToken {
        let reported = self
            .expiration
            .as_deref()
            .and_then(|e| DateTime::parse_from_rfc3339(e).ok())
            .map(|t| t.with_timezone(&Utc));

        match reported {
            Some(expires_at) => AccessToken::new(self.token.clone(), expires_at),
            None => AccessToken::from_literal(self.token.clone(), now),
        }
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("channel_id", &self.channel_id)
            .field("connection_name", &self.connection_name)
            .field("token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Whether a user has a token for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    /// Channel ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// OAuth connection name.
    pub connection_name: String,
    /// Whether a token is stored.
    #[serde(default)]
    pub has_token: bool,
    /// Identity provider display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_provider_display_name: Option<String>,
}

/// Resource used for single sign-on token exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeResource {
    /// Resource ID.
    pub id: Option<String>,
    /// Application ID URI.
    pub uri: Option<String>,
    /// Identity provider ID.
    pub provider_id: Option<String>,
}

/// Resource for posting a token directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPostResource {
    /// Shared access signature URL.
    pub sas_url: Option<String>,
}

/// Sign-in resource returned by `GetSignInResource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInUrlResponse {
    /// URL the user opens to sign in.
    pub sign_in_link: Option<String>,
    /// SSO exchange resource.
    pub token_exchange_resource: Option<TokenExchangeResource>,
    /// Direct token post resource.
    pub token_post_resource: Option<TokenPostResource>,
}

/// Parameters for `GetToken`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserTokenParams {
    /// User ID on the channel.
    pub user_id: String,
    /// OAuth connection name.
    pub connection_name: String,
    /// Channel ID (e.g. `msteams`).
    pub channel_id: String,
    /// Magic code from the sign-in flow, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Parameters for `GetAadTokens`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetUserAadTokenParams {
    /// User ID on the channel.
    pub user_id: String,
    /// OAuth connection name.
    pub connection_name: String,
    /// Channel ID.
    pub channel_id: String,
    /// Resources to get tokens for.
    pub resource_urls: Vec<String>,
}

/// Parameters for `GetTokenStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserTokenStatusParams {
    /// User ID on the channel.
    pub user_id: String,
    /// Channel ID.
    pub channel_id: String,
    /// Connection name filter.
    #[serde(rename = "include", skip_serializing_if = "Option::is_none")]
    pub include_filter: Option<String>,
}

/// Parameters for `SignOut`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutUserParams {
    /// User ID on the channel.
    pub user_id: String,
    /// OAuth connection name.
    pub connection_name: String,
    /// Channel ID.
    pub channel_id: String,
}

/// Body of a token exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenExchangeRequest {
    /// Resource URI to exchange for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Token to exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Parameters for `exchange`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeUserTokenParams {
    /// User ID on the channel.
    pub user_id: String,
    /// OAuth connection name.
    pub connection_name: String,
    /// Channel ID.
    pub channel_id: String,
    /// What to exchange.
    pub exchange_request: TokenExchangeRequest,
}

/// Parameters for `GetSignInUrl` and `GetSignInResource`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBotSignInUrlParams {
    /// Encoded [`TokenExchangeState`].
    pub state: String,
    /// PKCE code challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    /// Emulator URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emulator_url: Option<String>,
    /// Redirect after sign-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_redirect: Option<String>,
}

/// Conversation the sign-in flow belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    /// Conversation ID.
    pub id: String,
}

/// Conversation reference embedded in the sign-in state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateConversation {
    /// Conversation.
    pub conversation: ConversationRef,
    /// Channel ID.
    pub channel_id: String,
    /// Bot service URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

/// State passed to the token service when requesting a sign-in URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeState {
    /// OAuth connection name.
    pub connection_name: String,
    /// Conversation the sign-in card was sent to.
    pub conversation: StateConversation,
    /// Bot application ID.
    pub ms_app_id: String,
}

impl TokenExchangeState {
    /// Create state for a conversation on a channel.
    #[must_use]
    pub fn new(
        connection_name: impl Into<String>,
        conversation_id: impl Into<String>,
        channel_id: impl Into<String>,
        ms_app_id: impl Into<String>,
    ) -> Self {
        Self {
            connection_name: connection_name.into(),
            conversation: StateConversation {
                conversation: ConversationRef {
                    id: conversation_id.into(),
                },
                channel_id: channel_id.into(),
                service_url: None,
            },
            ms_app_id: ms_app_id.into(),
        }
    }

    /// Base64-encoded JSON, as expected in the `state` query parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| CoreError::Serialization(format!("serializing sign-in state: {e}")))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }
}
