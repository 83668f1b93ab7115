//! Application configuration for TransFit enrichment.
//!
//! User config lives at `~/.transfit/transfit.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransfitError};
use crate::types::{DEFAULT_CONTEXT, DEFAULT_POPULATION};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "transfit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".transfit";

// ---------------------------------------------------------------------------
// Config structs (matching transfit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Generative service settings.
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the libSQL database holding research, exercises, and tips.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Maximum tips persisted per run. `0` means no limit.
    #[serde(default = "default_max_exercises")]
    pub max_exercises: usize,

    /// Maximum research articles rendered into one evidence context.
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,

    /// Audience segment key for generated tips.
    #[serde(default = "default_population")]
    pub population: String,

    /// Usage scenario key for generated tips.
    #[serde(default = "default_context")]
    pub context: String,
}

impl DefaultsConfig {
    /// The per-run tip limit, or `None` when unbounded.
    pub fn batch_limit(&self) -> Option<usize> {
        (self.max_exercises > 0).then_some(self.max_exercises)
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_exercises: default_max_exercises(),
            max_articles: default_max_articles(),
            population: default_population(),
            context: default_context(),
        }
    }
}

fn default_database_path() -> String {
    "var/transfit.db".into()
}
fn default_max_exercises() -> usize {
    25
}
fn default_max_articles() -> usize {
    6
}
fn default_population() -> String {
    DEFAULT_POPULATION.into()
}
fn default_context() -> String {
    DEFAULT_CONTEXT.into()
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat model used for tip generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4.1-mini".into()
}
fn default_base_url() -> String {
    "https://api.openai.com".into()
}
fn default_timeout_secs() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.transfit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TransfitError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.transfit/transfit.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
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
    let content = std::fs::read_to_string(path).map_err(|e| TransfitError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        TransfitError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TransfitError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TransfitError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TransfitError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the API key from the configured env var.
///
/// Fails with [`TransfitError::MissingDependency`] when unset or empty.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(TransfitError::missing(var_name.as_str())),
    }
}
