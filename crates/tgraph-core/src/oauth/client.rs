//! Token service REST clients.

use std::collections::HashMap;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;

use crate::http;
use crate::oauth::models::{
    ExchangeUserTokenParams, GetBotSignInUrlParams, GetUserAadTokenParams, GetUserTokenParams,
    GetUserTokenStatusParams, SignInUrlResponse, SignOutUserParams, TokenResponse, TokenStatus,
};
use crate::oauth::settings::ApiClientSettings;
use crate::token::Token;
use crate::{CoreError, Result};

const USER_TOKEN_GET: &str = "api/usertoken/GetToken";
const USER_TOKEN_GET_AAD: &str = "api/usertoken/GetAadTokens";
const USER_TOKEN_STATUS: &str = "api/usertoken/GetTokenStatus";
const USER_TOKEN_SIGN_OUT: &str = "api/usertoken/SignOut";
const USER_TOKEN_EXCHANGE: &str = "api/usertoken/exchange";
const BOT_SIGN_IN_URL: &str = "api/botsignin/GetSignInUrl";
const BOT_SIGN_IN_RESOURCE: &str = "api/botsignin/GetSignInResource";

/// Query keys shared by the per-connection endpoints.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionQuery<'a> {
    user_id: &'a str,
    connection_name: &'a str,
    channel_id: &'a str,
}

/// Entry point for the token service. Sub-clients share its HTTP client,
/// settings and bot credential.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    settings: ApiClientSettings,
    bot_token: Option<Token>,
}

impl ApiClient {
    /// Create a client using `http` for every request.
    #[must_use]
    pub const fn new(http: Client, settings: ApiClientSettings) -> Self {
        Self {
            http,
            settings,
            bot_token: None,
        }
    }

    /// Authenticate requests with the bot's own token.
    #[must_use]
    pub fn with_bot_token(mut self, token: impl Into<Token>) -> Self {
        self.bot_token = Some(token.into());
        self
    }

    /// Replace the HTTP client. Sub-clients created afterwards use it.
    pub fn set_http(&mut self, http: Client) {
        self.http = http;
    }

    /// The endpoint settings.
    #[must_use]
    pub const fn settings(&self) -> &ApiClientSettings {
        &self.settings
    }

    /// User token operations.
    #[must_use]
    pub fn user_token(&self) -> UserTokenClient {
        UserTokenClient { api: self.clone() }
    }

    /// Bot sign-in operations.
    #[must_use]
    pub fn bot_sign_in(&self) -> BotSignInClient {
        BotSignInClient { api: self.clone() }
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.settings.endpoint(path);
        log::debug!("{method} {url}");
        let mut request = self.http.request(method, url);
        if let Some(token) = &self.bot_token {
            let access = token.resolve().await?;
            request = request.bearer_auth(access.token);
        }
        Ok(request)
    }

    async fn execute(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = http::send(request, what).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(http::error_for_response(response, what).await)
        }
    }
}

/// Reads and manages user tokens.
#[derive(Debug, Clone)]
pub struct UserTokenClient {
    api: ApiClient,
}

impl UserTokenClient {
    /// Get the user's token for a connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TokenResolution`] if the user has no token for the
    /// connection, or another error if the request fails.
    pub async fn get(&self, params: &GetUserTokenParams) -> Result<TokenResponse> {
        let what = "get user token";
        let request = self.api.request(Method::GET, USER_TOKEN_GET).await?.query(params);
        let response = http::send(request, what).await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Err(CoreError::TokenResolution(
                format!(
                    "user {} is not signed in to connection '{}'",
                    params.user_id, params.connection_name
                ),
            )),
            status if status.is_success() => http::json(response, what).await,
            _ => Err(http::error_for_response(response, what).await),
        }
    }

    /// Get Entra ID tokens for several resources at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn get_aad(
        &self,
        params: &GetUserAadTokenParams,
    ) -> Result<HashMap<String, TokenResponse>> {
        let what = "get AAD tokens";
        let query = ConnectionQuery {
            user_id: &params.user_id,
            connection_name: &params.connection_name,
            channel_id: &params.channel_id,
        };
        let body = serde_json::json!({ "resourceUrls": params.resource_urls });
        let request = self
            .api
            .request(Method::POST, USER_TOKEN_GET_AAD)
            .await?
            .query(&query)
            .json(&body);
        let response = self.api.execute(request, what).await?;
        http::json(response, what).await
    }

    /// List token status per connection for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn get_status(&self, params: &GetUserTokenStatusParams) -> Result<Vec<TokenStatus>> {
        let what = "get token status";
        let request = self
            .api
            .request(Method::GET, USER_TOKEN_STATUS)
            .await?
            .query(params);
        let response = self.api.execute(request, what).await?;
        http::json(response, what).await
    }

    /// Revoke the user's token for a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn sign_out(&self, params: &SignOutUserParams) -> Result<()> {
        let request = self
            .api
            .request(Method::DELETE, USER_TOKEN_SIGN_OUT)
            .await?
            .query(params);
        self.api.execute(request, "sign out").await?;
        log::info!(
            "signed out user {} from connection '{}'",
            params.user_id,
            params.connection_name
        );
        Ok(())
    }

    /// Exchange a token (typically an SSO token) for a connection token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn exchange(&self, params: &ExchangeUserTokenParams) -> Result<TokenResponse> {
        let what = "exchange token";
        let query = ConnectionQuery {
            user_id: &params.user_id,
            connection_name: &params.connection_name,
            channel_id: &params.channel_id,
        };
        let request = self
            .api
            .request(Method::POST, USER_TOKEN_EXCHANGE)
            .await?
            .query(&query)
            .json(&params.exchange_request);
        let response = self.api.execute(request, what).await?;
        http::json(response, what).await
    }
}

/// Builds sign-in links for the OAuth card.
#[derive(Debug, Clone)]
pub struct BotSignInClient {
    api: ApiClient,
}

impl BotSignInClient {
    /// Get a sign-in URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_url(&self, params: &GetBotSignInUrlParams) -> Result<String> {
        let what = "get sign-in URL";
        let request = self.api.request(Method::GET, BOT_SIGN_IN_URL).await?.query(params);
        let response = self.api.execute(request, what).await?;
        response
            .text()
            .await
            .map_err(|e| CoreError::Api(format!("reading {what} response: {e}")))
    }

    /// Get the sign-in resource (link plus SSO exchange details).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn get_resource(&self, params: &GetBotSignInUrlParams) -> Result<SignInUrlResponse> {
        let what = "get sign-in resource";
        let request = self
            .api
            .request(Method::GET, BOT_SIGN_IN_RESOURCE)
            .await?
            .query(params);
        let response = self.api.execute(request, what).await?;
        http::json(response, what).await
    }
}
