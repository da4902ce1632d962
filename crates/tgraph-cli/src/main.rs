//! CLI interface for tgraph - Teams token plumbing and Graph from the terminal.

use std::env;
use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow};
use chrono::Utc;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use env_logger::fmt::WriteStyle;
use log::{LevelFilter, debug};
use tgraph_core::graph::{format_messages, format_presence, format_profile, format_teams};
use tgraph_core::oauth::{
    GetBotSignInUrlParams, GetUserTokenParams, GetUserTokenStatusParams, SignOutUserParams,
    TokenExchangeState,
};
use tgraph_core::paths::write_default_config;
use tgraph_core::{
    AccessToken, ApiClient, AppConfig, AppPaths, DirectTokenCredential, GraphClient, Token,
    TokenClaims, UserTokenClient, UserTokenProvider, generate_schema,
};

const APP_NAME: &str = "tgraph";

/// Repository URL for the schema `$id`.
const REPO_URL: &str = "https://github.com/byteowlz/tgraph";

fn main() -> anyhow::Result<()> {
    try_main()
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {:#?}", ctx.paths);

    match cli.command {
        Command::Token { command } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(handle_token(&ctx, command))
        }
        Command::Graph { command } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(handle_graph(&ctx, command))
        }
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "tgraph",
    author,
    version,
    about = "Teams user tokens and Microsoft Graph from the terminal",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

/// Common CLI options shared across all subcommands.
#[derive(Debug, Clone, Args)]
pub struct CommonOpts {
    /// Override the config file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
    /// Reduce output to only errors.
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    pub quiet: bool,
    /// Increase logging verbosity (stackable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,
    /// Enable trace logging.
    #[arg(long, global = true)]
    pub trace: bool,
    /// Output machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,
    /// Disable ANSI colors in output.
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    pub no_color: bool,
    /// Control color output.
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    pub color: ColorOption,
    /// Do not change anything on disk.
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
    /// Assume "yes" for interactive prompts.
    #[arg(short = 'y', long = "yes", global = true)]
    pub assume_yes: bool,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
    /// Detect terminal capabilities automatically.
    Auto,
    /// Always emit ANSI color codes.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect tokens and call the Bot Framework token service.
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },
    /// Call Microsoft Graph on behalf of a user.
    Graph {
        #[command(subcommand)]
        command: GraphCommand,
    },
    /// Create config directories and default files.
    Init(InitCommand),
    /// Inspect and manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Identifies a user on a channel for token service calls.
#[derive(Debug, Clone, Args)]
struct UserArgs {
    /// Bot token used to authenticate against the token service.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,
    /// User ID on the channel (e.g. `29:...`).
    #[arg(long)]
    user_id: String,
    /// Channel ID.
    #[arg(long, default_value = "msteams")]
    channel_id: String,
    /// OAuth connection name. Defaults to `oauth.default_connection_name`.
    #[arg(long)]
    connection: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
enum TokenCommand {
    /// Decode a JWT and show its claims and remaining lifetime.
    Inspect {
        /// The token to decode.
        token: String,
    },
    /// Fetch the user's token for a connection.
    Get {
        #[command(flatten)]
        user: UserArgs,
        /// Magic code from the sign-in flow.
        #[arg(long)]
        code: Option<String>,
        /// Print the raw token instead of a summary.
        #[arg(long)]
        reveal: bool,
    },
    /// Show which connections the user has tokens for.
    Status {
        #[command(flatten)]
        user: UserArgs,
    },
    /// Revoke the user's token for a connection.
    Signout {
        #[command(flatten)]
        user: UserArgs,
    },
    /// Get a sign-in URL for a conversation.
    SigninUrl {
        /// Bot token used to authenticate against the token service.
        #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
        bot_token: Option<String>,
        /// Conversation the sign-in card belongs to.
        #[arg(long)]
        conversation_id: String,
        /// Bot application ID.
        #[arg(long, env = "CLIENT_ID")]
        app_id: String,
        /// Channel ID.
        #[arg(long, default_value = "msteams")]
        channel_id: String,
        /// OAuth connection name. Defaults to `oauth.default_connection_name`.
        #[arg(long)]
        connection: Option<String>,
    },
}

/// Where the Graph token comes from.
#[derive(Debug, Clone, Args)]
struct GraphAuthArgs {
    /// Literal Graph access token.
    #[arg(long, env = "GRAPH_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Fetch the token from the token service for this user. Wins over `--token`.
    #[arg(long)]
    user_id: Option<String>,
    /// Channel ID used with `--user-id`.
    #[arg(long, default_value = "msteams")]
    channel_id: String,
    /// OAuth connection name. Defaults to `oauth.default_connection_name`.
    #[arg(long)]
    connection: Option<String>,
    /// Bot token used with `--user-id`.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,
}

/// Resolved origin of the Graph token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenSource {
    Literal(String),
    UserId(String),
}

impl GraphAuthArgs {
    /// `--user-id` takes precedence so an exported `GRAPH_TOKEN` never masks it.
    fn source(&mut self) -> Option<TokenSource> {
        match (self.user_id.take(), self.token.take()) {
            (Some(user_id), _) => Some(TokenSource::UserId(user_id)),
            (None, Some(literal)) => Some(TokenSource::Literal(literal)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum GraphCommand {
    /// Show the signed-in user's profile.
    Profile {
        #[command(flatten)]
        auth: GraphAuthArgs,
    },
    /// List recent emails.
    Emails {
        #[command(flatten)]
        auth: GraphAuthArgs,
        /// Number of emails to show.
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: u32,
    },
    /// List joined teams.
    Teams {
        #[command(flatten)]
        auth: GraphAuthArgs,
    },
    /// Show the signed-in user's presence.
    Presence {
        #[command(flatten)]
        auth: GraphAuthArgs,
    },
}

#[derive(Debug, Clone, Copy, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists.
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration.
    Show,
    /// Print the resolved config file path.
    Path,
    /// Print all resolved paths.
    Paths,
    /// Print the JSON schema.
    Schema,
    /// Regenerate the default configuration file.
    Reset,
}

// ─── Runtime ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;
        let config = AppConfig::load(&paths, common.dry_run)?;
        let ctx = Self {
            common,
            paths,
            config,
        };
        ctx.ensure_directories()?;
        Ok(ctx)
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        builder.filter_level(self.effective_log_level());

        let force_color = matches!(self.common.color, ColorOption::Always)
            || env::var_os("FORCE_COLOR").is_some();
        let disable_color = self.common.no_color
            || matches!(self.common.color, ColorOption::Never)
            || env::var_os("NO_COLOR").is_some()
            || (!force_color && !io::stderr().is_terminal());

        if let Some(ref file) = self.config.logging.file {
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .with_context(|| format!("opening log file {file}"))?;
            builder.target(env_logger::Target::Pipe(Box::new(log_file)));
            builder.write_style(WriteStyle::Never);
        } else if disable_color {
            builder.write_style(WriteStyle::Never);
        } else if force_color {
            builder.write_style(WriteStyle::Always);
        } else {
            builder.write_style(WriteStyle::Auto);
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    const fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn ensure_directories(&self) -> Result<()> {
        if self.common.dry_run {
            self.paths.log_dry_run();
            return Ok(());
        }
        self.paths.ensure_directories()
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        Ok(tgraph_core::http::build_client(self.config.timeout_secs())?)
    }

    fn connection_name(&self, explicit: Option<String>) -> String {
        explicit.unwrap_or_else(|| self.config.oauth.default_connection_name.clone())
    }

    fn api_client(&self, bot_token: Option<String>) -> Result<ApiClient> {
        let client = ApiClient::new(self.http_client()?, self.config.api_client_settings());
        Ok(match bot_token {
            Some(token) => client.with_bot_token(token),
            None => client,
        })
    }

    fn user_token_client(&self, bot_token: Option<String>) -> Result<UserTokenClient> {
        Ok(self.api_client(bot_token)?.user_token())
    }

    /// Build a Graph client from either a literal token or the token service.
    fn graph_client(&self, mut auth: GraphAuthArgs) -> Result<GraphClient> {
        let source = auth.source();
        let connection_name = self.connection_name(auth.connection);
        let token = match source {
            Some(TokenSource::Literal(literal)) => Token::literal(literal),
            Some(TokenSource::UserId(user_id)) => {
                let params = GetUserTokenParams {
                    user_id,
                    connection_name: connection_name.clone(),
                    channel_id: auth.channel_id,
                    code: None,
                };
                UserTokenProvider::new(self.user_token_client(auth.bot_token)?, params)
                    .into_token()
            }
            None => {
                return Err(anyhow!(
                    "no Graph token: pass --token (or set GRAPH_TOKEN) or --user-id"
                ));
            }
        };

        let credential = DirectTokenCredential::new(token, Some(connection_name.clone()));
        Ok(
            GraphClient::with_http_client(self.http_client()?, Arc::new(credential))
                .with_base_url(self.config.graph.base_url.clone())
                .with_scopes(self.config.graph.scopes.clone())
                .with_connection_name(Some(connection_name)),
        )
    }
}

// ─── Handlers ────────────────────────────────────────────────────────

async fn handle_token(ctx: &RuntimeContext, cmd: TokenCommand) -> Result<()> {
    match cmd {
        TokenCommand::Inspect { token } => {
            let claims = TokenClaims::decode(&token)?;
            let access = AccessToken::new(token, claims.expires_at);
            let remaining = access.remaining(Utc::now());

            if ctx.common.json {
                return print_json(&serde_json::json!({
                    "tenant_id": claims.tenant_id,
                    "object_id": claims.object_id,
                    "user_principal_name": claims.user_principal_name,
                    "audience": claims.audience,
                    "expires_at": claims.expires_at,
                    "remaining_secs": remaining.num_seconds(),
                }));
            }

            let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
            println!("User:      {}", na(&claims.user_principal_name));
            println!("Tenant ID: {}", na(&claims.tenant_id));
            println!("Object ID: {}", na(&claims.object_id));
            println!("Audience:  {}", na(&claims.audience));
            println!("Expires:   {}", claims.expires_at.to_rfc3339());
            if remaining.num_seconds() > 0 {
                println!(
                    "Remaining: {}m {}s",
                    remaining.num_minutes(),
                    remaining.num_seconds() % 60
                );
            } else {
                println!("Remaining: expired");
            }
            Ok(())
        }
        TokenCommand::Get { user, code, reveal } => {
            let connection_name = ctx.connection_name(user.connection);
            let params = GetUserTokenParams {
                user_id: user.user_id,
                connection_name,
                channel_id: user.channel_id,
                code,
            };
            let response = ctx.user_token_client(user.bot_token)?.get(&params).await?;
            let access = response.to_access_token(Utc::now());

            if ctx.common.json {
                return print_json(&serde_json::json!({
                    "connection_name": response.connection_name,
                    "channel_id": response.channel_id,
                    "expires_at": access.expires_at,
                    "token": reveal.then_some(response.token.as_str()),
                }));
            }

            println!("Connection: {}", response.connection_name);
            println!("Expires:    {}", access.expires_at.to_rfc3339());
            if reveal {
                println!("{}", response.token);
            }
            Ok(())
        }
        TokenCommand::Status { user } => {
            let params = GetUserTokenStatusParams {
                user_id: user.user_id,
                channel_id: user.channel_id,
                include_filter: user.connection,
            };
            let statuses = ctx
                .user_token_client(user.bot_token)?
                .get_status(&params)
                .await?;

            if ctx.common.json {
                return print_json(&statuses);
            }
            if statuses.is_empty() {
                println!("No connections configured for this bot.");
            }
            for status in &statuses {
                let state = if status.has_token { "signed in" } else { "signed out" };
                let provider = status
                    .service_provider_display_name
                    .as_deref()
                    .unwrap_or("");
                println!("  {:<24} {state:<11} {provider}", status.connection_name);
            }
            Ok(())
        }
        TokenCommand::Signout { user } => {
            let params = SignOutUserParams {
                user_id: user.user_id,
                connection_name: ctx.connection_name(user.connection),
                channel_id: user.channel_id,
            };
            if ctx.common.dry_run {
                log::info!(
                    "dry-run: would sign out {} from '{}'",
                    params.user_id,
                    params.connection_name
                );
                return Ok(());
            }
            ctx.user_token_client(user.bot_token)?
                .sign_out(&params)
                .await?;
            println!("Signed out of '{}'.", params.connection_name);
            Ok(())
        }
        TokenCommand::SigninUrl {
            bot_token,
            conversation_id,
            app_id,
            channel_id,
            connection,
        } => {
            let state = TokenExchangeState::new(
                ctx.connection_name(connection),
                conversation_id,
                channel_id,
                app_id,
            );
            let params = GetBotSignInUrlParams {
                state: state.encode()?,
                ..GetBotSignInUrlParams::default()
            };
            let url = ctx.api_client(bot_token)?.bot_sign_in().get_url(&params).await?;

            if ctx.common.json {
                return print_json(&serde_json::json!({ "sign_in_url": url }));
            }
            println!("{url}");
            Ok(())
        }
    }
}

async fn handle_graph(ctx: &RuntimeContext, cmd: GraphCommand) -> Result<()> {
    match cmd {
        GraphCommand::Profile { auth } => {
            let user = ctx.graph_client(auth)?.me().await?;
            if ctx.common.json {
                return print_json(&user);
            }
            println!("{}", format_profile(&user));
        }
        GraphCommand::Emails { auth, limit } => {
            let messages = ctx.graph_client(auth)?.messages(limit).await?;
            if ctx.common.json {
                return print_json(&messages);
            }
            println!("{}", format_messages(&messages));
        }
        GraphCommand::Teams { auth } => {
            let teams = ctx.graph_client(auth)?.joined_teams().await?;
            if ctx.common.json {
                return print_json(&teams);
            }
            println!("{}", format_teams(&teams));
        }
        GraphCommand::Presence { auth } => {
            let presence = ctx.graph_client(auth)?.presence().await?;
            if ctx.common.json {
                return print_json(&presence);
            }
            println!("{}", format_presence(&presence));
        }
    }
    Ok(())
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }
    if ctx.common.dry_run {
        log::info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }
    write_default_config(&ctx.paths.config_file)
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                print_json(&ctx.config)?;
            } else {
                println!("{:#?}", ctx.config);
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Paths => {
            if ctx.common.json {
                print_json(&serde_json::json!({
                    "config": ctx.paths.config_file,
                    "state": ctx.paths.state_dir,
                }))?;
            } else {
                println!("config: {}", ctx.paths.config_file.display());
                println!("state:  {}", ctx.paths.state_dir.display());
            }
            Ok(())
        }
        ConfigCommand::Schema => {
            println!("{}", generate_schema(APP_NAME, REPO_URL)?);
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                log::info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serializing output to JSON")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_graph_emails_with_literal_token() {
        let cli = Cli::try_parse_from([
            "tgraph", "--json", "graph", "emails", "--token", "abc", "-n", "3",
        ])
        .expect("parse");
        assert!(cli.common.json);
        match cli.command {
            Command::Graph {
                command: GraphCommand::Emails { auth, limit },
            } => {
                assert_eq!(auth.token.as_deref(), Some("abc"));
                assert_eq!(limit, 3);
                assert_eq!(auth.channel_id, "msteams");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn user_id_wins_over_token() {
        let cli = Cli::try_parse_from([
            "tgraph", "graph", "teams", "--token", "from-env", "--user-id", "29:u",
        ])
        .expect("token and user id together parse");
        match cli.command {
            Command::Graph {
                command: GraphCommand::Teams { mut auth },
            } => {
                assert_eq!(auth.source(), Some(TokenSource::UserId("29:u".to_string())));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn literal_token_used_without_user_id() {
        let cli = Cli::try_parse_from(["tgraph", "graph", "profile", "--token", "abc"])
            .expect("parse");
        match cli.command {
            Command::Graph {
                command: GraphCommand::Profile { mut auth },
            } => {
                assert_eq!(auth.source(), Some(TokenSource::Literal("abc".to_string())));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn init_accepts_force_and_yes() {
        let cli = Cli::try_parse_from(["tgraph", "-y", "init", "--force"]).expect("parse");
        assert!(cli.common.assume_yes);
        match cli.command {
            Command::Init(cmd) => assert!(cmd.force),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_token_get() {
        let cli = Cli::try_parse_from([
            "tgraph",
            "token",
            "get",
            "--user-id",
            "29:user",
            "--connection",
            "sso",
            "--bot-token",
            "bot",
        ])
        .expect("parse");
        match cli.command {
            Command::Token {
                command: TokenCommand::Get { user, code, reveal },
            } => {
                assert_eq!(user.user_id, "29:user");
                assert_eq!(user.connection.as_deref(), Some("sso"));
                assert_eq!(user.bot_token.as_deref(), Some("bot"));
                assert!(code.is_none());
                assert!(!reveal);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
