//! Error types for the core library.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration-related error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A path resolution or validation error.
    #[error("path error: {0}")]
    Path(String),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A malformed or unreadable credential.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A token could not be produced by its source.
    #[error("token resolution failed: {0}")]
    TokenResolution(String),

    /// A token was resolved but is no longer valid.
    #[error("token expired at {expired_at}")]
    TokenExpired {
        /// When the resolved token stopped being valid.
        expired_at: DateTime<Utc>,
    },

    /// The remote service rejected the credential (HTTP 401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An API or HTTP error.
    #[error("API error: {0}")]
    Api(String),

    /// A generic error for other cases.
    #[error("error: {0}")]
    Other(String),
}

impl CoreError {
    /// Whether the caller should ask the user to sign in again.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_) | Self::TokenExpired { .. } | Self::TokenResolution(_)
        )
    }
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;
