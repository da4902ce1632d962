//! Bot Framework token service clients.
//!
//! The token service stores user tokens per OAuth connection once the user
//! has signed in through the bot. These clients read, exchange and revoke
//! those tokens, and [`UserTokenProvider`] turns a `GetToken` call into a
//! provider-backed [`Token`](crate::token::Token).

pub mod client;
pub mod models;
pub mod provider;
pub mod settings;

pub use client::{ApiClient, BotSignInClient, UserTokenClient};
pub use models::{
    ExchangeUserTokenParams, GetBotSignInUrlParams, GetUserAadTokenParams, GetUserTokenParams,
    GetUserTokenStatusParams, SignInUrlResponse, SignOutUserParams, TokenExchangeRequest,
    TokenExchangeResource, TokenExchangeState, TokenPostResource, TokenResponse, TokenStatus,
};
pub use provider::UserTokenProvider;
pub use settings::{ApiClientSettings, DEFAULT_OAUTH_URL, OAUTH_URL_ENV};
