//! Where `tgraph` keeps its config file and state.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::schema::CONFIG_FILENAME;
use crate::{APP_NAME, AppConfig, env_prefix};

/// Resolved config file and state directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// `config.toml`, from `--config` or the XDG config dir.
    pub config_file: PathBuf,
    /// Log files and other runtime state.
    pub state_dir: PathBuf,
}

impl AppPaths {
    /// Resolve paths. A directory override gets `config.toml` appended.
    ///
    /// # Errors
    ///
    /// Returns an error if `~` or `$VAR` expansion fails or no home directory exists.
    pub fn discover(override_path: Option<&Path>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(path)?;
                if expanded.is_dir() {
                    expanded.join(CONFIG_FILENAME)
                } else {
                    expanded
                }
            }
            None => default_config_dir()?.join(CONFIG_FILENAME),
        };

        if config_file.parent().is_none() {
            return Err(anyhow!(
                "invalid config file path: {}",
                config_file.display()
            ));
        }

        Ok(Self {
            config_file,
            state_dir: default_state_dir()?,
        })
    }

    /// Create the state directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.state_dir)
            .with_context(|| format!("creating state directory {}", self.state_dir.display()))
    }

    /// Report what `ensure_directories` would do.
    pub fn log_dry_run(&self) {
        log::info!(
            "dry-run: would ensure state dir {}",
            self.state_dir.display()
        );
    }
}

impl std::fmt::Display for AppPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "config: {}, state: {}",
            self.config_file.display(),
            self.state_dir.display()
        )
    }
}

/// [`expand_str_path`] for a `Path`. Non-UTF-8 paths are returned as is.
///
/// # Errors
///
/// Returns an error if an environment variable in the path is unset.
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    path.to_str()
        .map_or_else(|| Ok(path.to_path_buf()), expand_str_path)
}

/// Expand `~` and `$VAR` in `text`.
///
/// # Errors
///
/// Returns an error if an environment variable in the path is unset.
pub fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

/// `$XDG_CONFIG_HOME/tgraph`, falling back to the platform config dir, then `~/.config/tgraph`.
///
/// # Errors
///
/// Returns an error if no home directory can be found.
pub fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

/// `$XDG_STATE_HOME/tgraph`, falling back to the platform state dir, then `~/.local/state/tgraph`.
///
/// # Errors
///
/// Returns an error if no home directory can be found.
pub fn default_state_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::state_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("state").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine state directory"))
}

/// Write a commented default `AppConfig` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let body = toml::to_string_pretty(&AppConfig::default())
        .context("serializing default config to TOML")?;
    let prefix = env_prefix();
    let contents = format!(
        "# Configuration for {APP_NAME}\n\
         # File: {}\n\
         # Any key can be set as {prefix}__SECTION__KEY.\n\
         # OAUTH_URL, CONNECTION_NAME and PORT override the matching keys.\n\n\
         {body}",
        path.display()
    );
    fs::write(path, contents).with_context(|| format!("writing config file to {}", path.display()))
}
