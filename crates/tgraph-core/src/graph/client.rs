//! Graph REST client.
//!
//! Every call first asks the bound [`TokenCredential`] for a token, so a
//! provider-backed credential is re-resolved per request and an expired
//! token is reported before any network traffic to Graph.

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::credential::{DirectTokenCredential, TokenCredential};
use crate::graph::models::{Collection, MailMessage, Presence, Team, User};
use crate::http::{self, DEFAULT_TIMEOUT_SECS};
use crate::token::Token;
use crate::Result;

/// Graph v1.0 endpoint.
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Scope requested from the credential by default.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Fields requested when listing mail.
const MESSAGE_SELECT: &str = "subject,from,receivedDateTime";

/// Handle for Graph calls on behalf of one credential.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    credential: Arc<dyn TokenCredential>,
    connection_name: Option<String>,
    base_url: String,
    scopes: Vec<String>,
}

/// Create a Graph client for `token` using a [`DirectTokenCredential`].
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created.
pub fn get_graph_client(
    token: impl Into<Token>,
    connection_name: Option<String>,
) -> Result<GraphClient> {
    let credential = DirectTokenCredential::new(token, connection_name.clone());
    Ok(GraphClient::new(Arc::new(credential))?.with_connection_name(connection_name))
}

impl GraphClient {
    /// Create a client for `credential` with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(credential: Arc<dyn TokenCredential>) -> Result<Self> {
        Ok(Self::with_http_client(
            http::build_client(DEFAULT_TIMEOUT_SECS)?,
            credential,
        ))
    }

    /// Create a client reusing an existing HTTP client.
    #[must_use]
    pub fn with_http_client(http: Client, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            http,
            credential,
            connection_name: None,
            base_url: GRAPH_BASE_URL.to_string(),
            scopes: vec![GRAPH_DEFAULT_SCOPE.to_string()],
        }
    }

    /// Point the client at another Graph endpoint (national clouds, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the scopes requested from the credential.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Tag the client with the OAuth connection its token comes from.
    #[must_use]
    pub fn with_connection_name(mut self, connection_name: Option<String>) -> Self {
        self.connection_name = connection_name;
        self
    }

    /// The OAuth connection qualifier, if any.
    #[must_use]
    pub fn connection_name(&self) -> Option<&str> {
        self.connection_name.as_deref()
    }

    /// The Graph endpoint in use.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be resolved or the request fails.
    pub async fn me(&self) -> Result<User> {
        self.get_json("/me", &[], "get profile").await
    }

    /// List teams the signed-in user has joined.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be resolved or the request fails.
    pub async fn joined_teams(&self) -> Result<Vec<Team>> {
        let page: Collection<Team> = self
            .get_json("/me/joinedTeams", &[], "list joined teams")
            .await?;
        Ok(page.value)
    }

    /// List the `top` most recent mail messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be resolved or the request fails.
    pub async fn messages(&self, top: u32) -> Result<Vec<MailMessage>> {
        let query = [
            ("$select", MESSAGE_SELECT.to_string()),
            ("$top", top.to_string()),
        ];
        let page: Collection<MailMessage> = self
            .get_json("/me/messages", &query, "list messages")
            .await?;
        Ok(page.value)
    }

    /// Get the signed-in user's presence.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be resolved or the request fails.
    pub async fn presence(&self) -> Result<Presence> {
        self.get_json("/me/presence", &[], "get presence").await
    }

    async fn get_json<T>(&self, path: &str, query: &[(&str, String)], what: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let access = self.credential.get_token(&self.scopes).await?;
        let url = format!("{}{path}", self.base_url);
        log::debug!("GET {url}");

        let response = http::send(
            self.http.get(&url).query(query).bearer_auth(&access.token),
            what,
        )
        .await?;

        if !response.status().is_success() {
            return Err(http::error_for_response(response, what).await);
        }

        http::json(response, what).await
    }
}

impl fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .field("connection_name", &self.connection_name)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
