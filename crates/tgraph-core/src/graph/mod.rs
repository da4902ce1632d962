//! Microsoft Graph client bound to a token credential.
//!
//! This module provides:
//! - A Graph client that asks its credential for a token on every request
//! - Typed models for the `me` endpoint family
//! - Markdown renderers for profile and mail listings

pub mod client;
pub mod format;
pub mod models;

pub use client::{GRAPH_BASE_URL, GRAPH_DEFAULT_SCOPE, GraphClient, get_graph_client};
pub use format::{format_messages, format_presence, format_profile, format_teams};
pub use models::{EmailAddress, MailMessage, Presence, PresenceStatus, Recipient, Team, User};
