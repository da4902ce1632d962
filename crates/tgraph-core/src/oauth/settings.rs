//! Token service endpoint settings.

/// Global token service endpoint.
pub const DEFAULT_OAUTH_URL: &str = "https://token.botframework.com";

/// Environment variable overriding the token service endpoint.
pub const OAUTH_URL_ENV: &str = "OAUTH_URL";

/// Settings shared by the token service clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiClientSettings {
    /// Token service base URL. Regional bots use e.g.
    /// `https://europe.token.botframework.com`.
    pub oauth_url: String,
}

impl Default for ApiClientSettings {
    fn default() -> Self {
        Self::new(DEFAULT_OAUTH_URL)
    }
}

impl ApiClientSettings {
    /// Settings for a specific token service endpoint.
    #[must_use]
    pub fn new(oauth_url: impl Into<String>) -> Self {
        Self {
            oauth_url: oauth_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Combine explicit settings with an environment override.
    ///
    /// A non-empty `env_oauth_url` wins over `settings`.
    #[must_use]
    pub fn merge(settings: Option<Self>, env_oauth_url: Option<String>) -> Self {
        let settings = settings.unwrap_or_default();
        match env_oauth_url.filter(|v| !v.trim().is_empty()) {
            Some(url) => Self::new(url),
            None => settings,
        }
    }

    /// Combine explicit settings with `$OAUTH_URL`.
    #[must_use]
    pub fn from_env(settings: Option<Self>) -> Self {
        Self::merge(settings, std::env::var(OAUTH_URL_ENV).ok())
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.oauth_url)
    }
}
