//! Server configuration, loaded from a TOML file.
//!
//! This covers deployment-level settings only (port, paths, collector
//! cadence, optional API key). Runtime dashboard settings (gateway URL,
//! currency, branding) live in `data/config.json` and are managed through
//! the settings endpoints — see [`crate::store::settings`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required on write endpoints when set.
    /// The DASHBOARD_API_KEY env var takes priority.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Overall chat relay deadline, covering connect and the full
    /// streamed response.
    #[serde(default = "default_chat_relay_timeout_secs")]
    pub chat_relay_timeout_secs: u64,
}

fn default_port() -> u16 {
    39876
}

fn default_chat_relay_timeout_secs() -> u64 {
    150
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_key: None,
            chat_relay_timeout_secs: default_chat_relay_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding all dashboard JSON state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// The agent's per-session transcript directory
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
    /// The agent workspace (IDENTITY.md, HEARTBEAT.md)
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
    /// Agent log files scanned for recent error lines
    #[serde(default = "default_log_files")]
    pub log_files: Vec<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_sessions_dir() -> PathBuf {
    home_joined(".openclaw/agents/main/sessions")
}

fn default_workspace_dir() -> PathBuf {
    home_joined(".openclaw/workspace")
}

fn default_log_files() -> Vec<PathBuf> {
    vec![
        home_joined(".openclaw/logs/openclaw.log"),
        home_joined(".openclaw/agents/main/agent.log"),
    ]
}

fn home_joined(rel: &str) -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(rel))
        .unwrap_or_else(|| PathBuf::from("/root").join(rel))
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sessions_dir: default_sessions_dir(),
            workspace_dir: default_workspace_dir(),
            log_files: default_log_files(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Heartbeat freshness window, minutes
    #[serde(default = "default_heartbeat_minutes")]
    pub heartbeat_threshold_minutes: i64,
}

fn default_interval_secs() -> u64 {
    300
}

fn default_heartbeat_minutes() -> i64 {
    10
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            heartbeat_threshold_minutes: default_heartbeat_minutes(),
        }
    }
}

impl Config {
    /// Effective API key: env var wins over the config file.
    pub fn api_key(&self) -> Option<String> {
        Self::pick_api_key(
            std::env::var("DASHBOARD_API_KEY").ok(),
            self.server.api_key.clone(),
        )
    }

    /// Empty strings count as unset on both sides.
    fn pick_api_key(env: Option<String>, stored: Option<String>) -> Option<String> {
        env.filter(|k| !k.is_empty())
            .or_else(|| stored.filter(|k| !k.is_empty()))
    }

    /// Effective sessions directory (respects $OPENCLAW_SESSIONS).
    pub fn sessions_dir(&self) -> PathBuf {
        std::env::var("OPENCLAW_SESSIONS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.paths.sessions_dir.clone())
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("clawdash");
    Ok(dir)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    // Missing config is fine: every field has a workable default.
    if !path.exists() {
        tracing::info!(
            "No config file at {}, using defaults (run `clawdash --init` to write one)",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    Ok(config)
}

/// Write a starter config file with defaults for editing.
pub fn write_default() -> Result<PathBuf> {
    let path = default_config_path()?;
    if path.exists() {
        anyhow::bail!("Config already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(&path, content)?;

    // Config may hold an API key
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(path)
}
