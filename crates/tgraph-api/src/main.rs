//! HTTP API server for tgraph.
//!
//! Runs the app server (Graph passthrough and conversation memory) and the
//! developer tools server side by side.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::{Args, Parser};
use log::info;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tgraph_core::graph::{MailMessage, Presence, Team, User};
use tgraph_core::{
    AppConfig, AppPaths, ChatMessage, CoreError, DirectTokenCredential, GraphClient, MemoryStore,
};

/// Header naming the OAuth connection a bearer token came from.
const CONNECTION_HEADER: &str = "x-connection-name";

/// Messages returned by `/graph/messages` when `top` is absent.
const DEFAULT_MESSAGE_COUNT: u32 = 5;

fn main() -> anyhow::Result<()> {
    try_main()
}

#[tokio::main]
async fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AppPaths::discover(cli.common.config.as_deref())?;
    let mut config = AppConfig::load(&paths, false)?;
    if let Some(port) = cli.common.port {
        config.server.port = port;
    }
    if let Some(port) = cli.common.devtools_port {
        config.server.devtools_port = port;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.to_string()),
    )
    .init();

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host: {}", config.server.host))?;
    let app_addr = SocketAddr::new(host, config.server.port);
    let devtools_addr = SocketAddr::new(host, config.server.devtools_port);

    let state = AppState::new(config)?;
    let app = app_router(state);
    let devtools = devtools_router(devtools_addr.port());

    info!("Starting app server on {app_addr}");
    let app_listener = tokio::net::TcpListener::bind(app_addr)
        .await
        .with_context(|| format!("binding {app_addr}"))?;
    info!("Starting devtools server on {devtools_addr}");
    let devtools_listener = tokio::net::TcpListener::bind(devtools_addr)
        .await
        .with_context(|| format!("binding {devtools_addr}"))?;

    tokio::try_join!(
        async { axum::serve(app_listener, app).await.context("app server") },
        async {
            axum::serve(devtools_listener, devtools)
                .await
                .context("devtools server")
        },
    )?;

    Ok(())
}

#[derive(Debug, Parser)]
#[command(author, version, about = "HTTP API server for tgraph")]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Port for the app server (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Port for the developer tools server
    #[arg(long)]
    devtools_port: Option<u16>,
}

#[derive(Debug, Clone)]
struct AppState {
    config: Arc<AppConfig>,
    http: reqwest::Client,
    memory: MemoryStore,
}

impl AppState {
    fn new(config: AppConfig) -> Result<Self> {
        let http = tgraph_core::http::build_client(config.timeout_secs())?;
        Ok(Self {
            config: Arc::new(config),
            http,
            memory: MemoryStore::new(),
        })
    }

    /// Graph client for the bearer token of this request.
    fn graph_client(&self, headers: &HeaderMap) -> Result<GraphClient, ApiError> {
        let token = bearer_token(headers)
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "missing bearer token"))?;
        let connection_name = headers
            .get(CONNECTION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let credential = DirectTokenCredential::new(token, connection_name.clone());
        Ok(
            GraphClient::with_http_client(self.http.clone(), Arc::new(credential))
                .with_base_url(self.config.graph.base_url.clone())
                .with_scopes(self.config.graph.scopes.clone())
                .with_connection_name(connection_name),
        )
    }
}

fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/config", get(get_config))
        .route("/graph/me", get(graph_me))
        .route("/graph/teams", get(graph_teams))
        .route("/graph/presence", get(graph_presence))
        .route("/graph/messages", get(graph_messages))
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/{id}/memory",
            get(get_memory).post(append_memory).delete(clear_memory),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn devtools_router(port: u16) -> Router {
    Router::new()
        .route("/devtools", get(devtools_page))
        .route("/health", get(move || async move { Json(HealthResponse::ok(port)) }))
        .layer(TraceLayer::new_for_http())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = if err.requires_sign_in() {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::BAD_GATEWAY
        };
        log::warn!("request failed: {err}");
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

// ─── Handlers ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    port: u16,
}

impl HealthResponse {
    const fn ok(port: u16) -> Self {
        Self { status: "ok", port }
    }
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.config.server.port))
}

async fn get_config(State(state): State<AppState>) -> Json<AppConfig> {
    Json((*state.config).clone())
}

async fn graph_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.graph_client(&headers)?.me().await?))
}

async fn graph_teams(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Team>>, ApiError> {
    Ok(Json(state.graph_client(&headers)?.joined_teams().await?))
}

async fn graph_presence(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Presence>, ApiError> {
    Ok(Json(state.graph_client(&headers)?.presence().await?))
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    top: Option<u32>,
}

async fn graph_messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<MailMessage>>, ApiError> {
    let top = query.top.unwrap_or(DEFAULT_MESSAGE_COUNT);
    Ok(Json(state.graph_client(&headers)?.messages(top).await?))
}

async fn list_conversations(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.memory.conversation_ids().await)
}

async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<ChatMessage>> {
    let messages = match state.memory.get(&id).await {
        Some(memory) => memory.get_all().await,
        None => Vec::new(),
    };
    Json(messages)
}

async fn append_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(message): Json<ChatMessage>,
) -> (StatusCode, Json<Vec<ChatMessage>>) {
    let memory = state.memory.get_or_create(&id).await;
    memory.push(message).await;
    (StatusCode::CREATED, Json(memory.get_all().await))
}

async fn clear_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.memory.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("no memory for conversation {id}"),
        ))
    }
}

async fn devtools_page() -> Html<&'static str> {
    Html(include_str!("devtools.html"))
}
