//! Application configuration for Pagewatch.
//!
//! User config lives at `~/.pagewatch/pagewatch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PagewatchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pagewatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pagewatch";

/// Default database file name inside the config directory.
const DB_FILE_NAME: &str = "pagewatch.db";

// ---------------------------------------------------------------------------
// Config structs (matching pagewatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Page fetching settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Summarization backend settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Alert delivery settings.
    #[serde(default)]
    pub email: EmailConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Database path. Empty means `~/.pagewatch/pagewatch.db`.
    #[serde(default)]
    pub db_path: String,

    /// Concurrent fetches during a pass.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> u32 {
    4
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout per request in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every fetch. A realistic browser string
    /// by default; some sites block obvious bot agents.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// CSS selectors removed from the document before text extraction.
    /// A curated boilerplate list, not a generic content-extraction pass.
    #[serde(default = "default_strip_selectors")]
    pub strip_selectors: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            strip_selectors: default_strip_selectors(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
        .into()
}

fn default_strip_selectors() -> Vec<String> {
    [
        "script",
        "style",
        "noscript",
        "nav",
        "header",
        "footer",
        r#"[role="banner"]"#,
        r#"[role="navigation"]"#,
        ".ad",
        ".advertisement",
        ".ads",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    /// An unset var means the summarizer runs in degraded mode.
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Model used for change summaries.
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// API base URL (OpenAI-compatible chat-completions endpoint).
    #[serde(default = "default_openai_base")]
    pub api_base: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            model: default_openai_model(),
            api_base: default_openai_base(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_openai_model() -> String {
    "gpt-4o".into()
}
fn default_openai_base() -> String {
    "https://api.openai.com/v1".into()
}

/// `[email]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Name of the env var holding the delivery API key.
    /// An unset var means alerts are logged instead of sent.
    #[serde(default = "default_email_key_env")]
    pub api_key_env: String,

    /// From address for alert emails.
    #[serde(default = "default_email_from")]
    pub from: String,

    /// API base URL (Resend-style `/emails` endpoint).
    #[serde(default = "default_email_base")]
    pub api_base: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_email_key_env(),
            from: default_email_from(),
            api_base: default_email_base(),
        }
    }
}

fn default_email_key_env() -> String {
    "RESEND_API_KEY".into()
}
fn default_email_from() -> String {
    "Pagewatch <onboarding@resend.dev>".into()
}
fn default_email_base() -> String {
    "https://api.resend.com".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pagewatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PagewatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pagewatch/pagewatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the database path: config value if set, default location otherwise.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    if config.defaults.db_path.is_empty() {
        Ok(config_dir()?.join(DB_FILE_NAME))
    } else {
        Ok(PathBuf::from(&config.defaults.db_path))
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PagewatchError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PagewatchError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PagewatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PagewatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PagewatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the credential a config section points at, if its env var is set.
pub fn resolve_api_key(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}
