//! Core library for tgraph - token plumbing for Microsoft Teams apps.
//!
//! This crate provides:
//! - Literal and provider-backed tokens with expiration metadata
//! - A credential adapter that re-resolves tokens for the Graph client
//! - A Microsoft Graph client and reply formatting
//! - Bot Framework token service clients
//! - Per-conversation chat memory
//! - Configuration loading, XDG paths and schema generation

pub mod config;
pub mod credential;
pub mod error;
pub mod graph;
pub mod http;
pub mod memory;
pub mod oauth;
pub mod paths;
pub mod schema;
pub mod token;

pub use config::{
    AppConfig, GraphConfig, LogLevel, LoggingConfig, ModelConfig, ModelProvider, OAuthConfig,
    RuntimeConfig, ServerConfig,
};
pub use credential::{CachedCredential, DirectTokenCredential, TokenCredential};
pub use error::{CoreError, Result};
pub use graph::{GraphClient, get_graph_client};
pub use memory::{ChatMessage, ConversationMemory, MemoryStore, Role};
pub use oauth::{ApiClient, ApiClientSettings, BotSignInClient, UserTokenClient, UserTokenProvider};
pub use paths::{AppPaths, default_state_dir};
pub use schema::{generate_example_config, generate_schema, write_generated_files};
pub use token::{AccessToken, Token, TokenClaims, TokenProvider};

/// Application name used for config directories and environment prefix.
pub const APP_NAME: &str = "tgraph";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
