use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the extraction API backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Overall request timeout in seconds. No retries are attempted.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How list envelopes that do not match the expected shape are handled.
    #[serde(default)]
    pub parse_mode: ParseMode,
    /// When true, requests issued without a session token fail before
    /// reaching the network instead of being sent unauthenticated.
    #[serde(default = "default_require_token")]
    pub require_token: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            parse_mode: ParseMode::default(),
            require_token: default_require_token(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8650".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_require_token() -> bool {
    true
}

/// Policy for list responses whose envelope is missing or malformed.
///
/// Lenient treats them as an empty result set so the console stays usable
/// against older backend variants; strict turns them into request errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    #[default]
    Lenient,
    Strict,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Role a login must carry to be accepted by the console.
    #[serde(default = "default_required_role")]
    pub required_role: String,
    /// Where the session (token, role, username) is persisted between runs.
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required_role: default_required_role(),
            session_file: default_session_file(),
        }
    }
}

fn default_required_role() -> String {
    "admin".to_string()
}

fn default_session_file() -> PathBuf {
    PathBuf::from("./data/session.json")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse configuration file")?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment variables win over file values.
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("INSIGHT_API_URL") {
            self.api.base_url = url;
        }
        if let Ok(role) = std::env::var("INSIGHT_REQUIRED_ROLE") {
            self.auth.required_role = role;
        }
        if let Ok(file) = std::env::var("INSIGHT_SESSION_FILE") {
            self.auth.session_file = PathBuf::from(file);
        }
    }
}
