//! Configuration types and loading for the application.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::graph::{GRAPH_BASE_URL, GRAPH_DEFAULT_SCOPE};
use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::oauth::{ApiClientSettings, DEFAULT_OAUTH_URL, OAUTH_URL_ENV};
use crate::paths::{expand_str_path, write_default_config};
use crate::{AppPaths, env_prefix};

/// Environment variable selecting the default OAuth connection.
pub const CONNECTION_NAME_ENV: &str = "CONNECTION_NAME";

/// Environment variable overriding the app server port.
pub const PORT_ENV: &str = "PORT";

/// Default OAuth connection name.
pub const DEFAULT_CONNECTION_NAME: &str = "graph";

/// Default app server port.
pub const DEFAULT_PORT: u16 = 3978;

/// Default developer tools port.
pub const DEFAULT_DEVTOOLS_PORT: u16 = 3979;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(
    title = "Application Configuration",
    description = "Main configuration for the application"
)]
pub struct AppConfig {
    /// JSON Schema reference for editor support.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub schema: Option<String>,

    /// Active configuration profile.
    #[schemars(default = "default_profile")]
    pub profile: String,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Runtime behavior configuration.
    pub runtime: RuntimeConfig,

    /// Bot Framework token service settings.
    pub oauth: OAuthConfig,

    /// Microsoft Graph settings.
    pub graph: GraphConfig,

    /// HTTP server settings for `tgraph-api`.
    pub server: ServerConfig,

    /// Language model settings. Read only; nothing in this workspace calls a model.
    pub model: ModelConfig,
}

fn default_profile() -> String {
    "default".to_string()
}

impl AppConfig {
    /// Override the profile if a value is provided.
    #[must_use]
    pub fn with_profile_override(mut self, profile: Option<String>) -> Self {
        if let Some(profile) = profile {
            self.profile = profile;
        }
        self
    }

    /// Load configuration from file and environment, creating defaults if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed, or written.
    pub fn load(paths: &AppPaths, dry_run: bool) -> Result<Self> {
        if !paths.config_file.exists() {
            if dry_run {
                log::info!(
                    "dry-run: would create default config at {}",
                    paths.config_file.display()
                );
            } else {
                write_default_config(&paths.config_file)?;
            }
        }

        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path, then apply the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load_from_path(config_file: &Path) -> Result<Self> {
        Self::load_with_env(config_file, |key| std::env::var(key).ok())
    }

    /// Load configuration, resolving the bare environment overrides through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or an
    /// override has an invalid value.
    pub fn load_with_env<F>(config_file: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load_with_sources(config_file, Self::environment(), lookup)
    }

    /// The `TGRAPH__SECTION__KEY` source. `graph.scopes` is split on spaces.
    fn environment() -> Environment {
        Environment::with_prefix(env_prefix().as_str())
            .separator("__")
            .try_parsing(true)
            .list_separator(" ")
            .with_list_parse_key("graph.scopes")
    }

    fn load_with_sources<F>(config_file: &Path, environment: Environment, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let built = Config::builder()
            .set_default("profile", "default")?
            .set_default("logging.level", "info")?
            .set_default("runtime.timeout", i64::try_from(DEFAULT_TIMEOUT_SECS)?)?
            .set_default("oauth.url", DEFAULT_OAUTH_URL)?
            .set_default("oauth.default_connection_name", DEFAULT_CONNECTION_NAME)?
            .set_default("graph.base_url", GRAPH_BASE_URL)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("server.devtools_port", i64::from(DEFAULT_DEVTOOLS_PORT))?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(environment)
            .build()
            .with_context(|| format!("loading config from {}", config_file.display()))?;

        let mut config: Self = built.try_deserialize()?;

        if let Some(ref file) = config.logging.file {
            let expanded = expand_str_path(file)?;
            config.logging.file = Some(expanded.display().to_string());
        }

        config.apply_env_overrides(lookup)?;
        Ok(config)
    }

    /// Apply the unprefixed environment variables used by Teams app templates.
    ///
    /// Blank values are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is not a valid port number.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(name) = get(CONNECTION_NAME_ENV) {
            self.oauth.default_connection_name = name;
        }
        if let Some(url) = get(OAUTH_URL_ENV) {
            self.oauth.url = url;
        }
        if let Some(port) = get(PORT_ENV) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid {PORT_ENV} value: {port}"))?;
        }

        let model = &mut self.model;
        for (key, slot) in [
            ("AZURE_OPENAI_API_KEY", &mut model.azure_openai_api_key),
            ("AZURE_OPENAI_ENDPOINT", &mut model.azure_openai_endpoint),
            ("AZURE_OPENAI_MODEL", &mut model.azure_openai_model),
            ("AZURE_OPENAI_API_VERSION", &mut model.azure_openai_api_version),
            ("OPENAI_API_KEY", &mut model.openai_api_key),
        ] {
            if let Some(value) = get(key) {
                *slot = Some(value);
            }
        }

        Ok(())
    }

    /// Token service settings derived from `[oauth]`.
    #[must_use]
    pub fn api_client_settings(&self) -> ApiClientSettings {
        ApiClientSettings::new(self.oauth.url.clone())
    }

    /// HTTP timeout in seconds.
    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        self.runtime.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: None,
            profile: default_profile(),
            logging: LoggingConfig::default(),
            runtime: RuntimeConfig::default(),
            oauth: OAuthConfig::default(),
            graph: GraphConfig::default(),
            server: ServerConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Logging configuration")]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    #[schemars(default = "default_log_level")]
    pub level: LogLevel,

    /// Optional path for log file output. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Log level enumeration for schema validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only emit error-level messages.
    Error,
    /// Emit warnings and errors.
    Warn,
    /// Emit informational messages and above (default).
    #[default]
    Info,
    /// Emit debug diagnostics and above.
    Debug,
    /// Emit all messages including fine-grained traces.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

const fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Runtime behavior configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Runtime behavior configuration")]
pub struct RuntimeConfig {
    /// HTTP timeout in seconds (default: 60).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub timeout: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Bot Framework token service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Bot Framework token service settings")]
pub struct OAuthConfig {
    /// Token service base URL. Overridden by `OAUTH_URL`.
    pub url: String,

    /// OAuth connection used when none is given. Overridden by `CONNECTION_NAME`.
    pub default_connection_name: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OAUTH_URL.to_string(),
            default_connection_name: DEFAULT_CONNECTION_NAME.to_string(),
        }
    }
}

/// Microsoft Graph configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Microsoft Graph settings")]
pub struct GraphConfig {
    /// Graph API base URL.
    pub base_url: String,

    /// Scopes requested from the credential.
    pub scopes: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: GRAPH_BASE_URL.to_string(),
            scopes: vec![GRAPH_DEFAULT_SCOPE.to_string()],
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "HTTP server settings")]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,

    /// App server port. Overridden by `PORT`.
    pub port: u16,

    /// Developer tools port.
    pub devtools_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            devtools_port: DEFAULT_DEVTOOLS_PORT,
        }
    }
}

/// Which language model backend is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Azure OpenAI.
    Azure,
    /// OpenAI.
    OpenAi,
}

/// Language model settings. API keys are accepted but never written back out.
#[derive(Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Language model settings")]
pub struct ModelConfig {
    /// Azure OpenAI API key.
    #[serde(skip_serializing)]
    pub azure_openai_api_key: Option<String>,

    /// Azure OpenAI endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_openai_endpoint: Option<String>,

    /// Azure OpenAI deployment name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_openai_model: Option<String>,

    /// Azure OpenAI API version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_openai_api_version: Option<String>,

    /// OpenAI API key.
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
}

impl ModelConfig {
    /// The configured backend, preferring Azure when both are present.
    #[must_use]
    pub const fn provider(&self) -> Option<ModelProvider> {
        if self.azure_openai_api_key.is_some() && self.azure_openai_endpoint.is_some() {
            Some(ModelProvider::Azure)
        } else if self.openai_api_key.is_some() {
            Some(ModelProvider::OpenAi)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ModelConfig")
            .field("azure_openai_api_key", &redact(&self.azure_openai_api_key))
            .field("azure_openai_endpoint", &self.azure_openai_endpoint)
            .field("azure_openai_model", &self.azure_openai_model)
            .field("azure_openai_api_version", &self.azure_openai_api_version)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .finish()
    }
}
