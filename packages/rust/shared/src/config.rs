//! Application configuration for Prospector.
//!
//! User config lives at `~/.prospector/prospector.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! The config file stores the *names* of the environment variables holding
//! API keys, never the keys themselves. Keys are resolved once into a
//! [`Credentials`] value and threaded explicitly through the run context;
//! ambient process state is never mutated for downstream libraries.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProspectorError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "prospector.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".prospector";

// ---------------------------------------------------------------------------
// Config structs (matching prospector.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Per-run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// API credential env-var names.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Batch coordinator settings.
    #[serde(default)]
    pub batch: BatchDefaults,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Minimum confidence before a data point stops needing improvement.
    #[serde(default = "default_minimum_confidence")]
    pub minimum_confidence: u8,

    /// Cap on internal pages visited per run.
    #[serde(default = "default_max_internal_pages")]
    pub max_internal_pages: usize,

    /// Cap on search queries executed per run.
    #[serde(default = "default_max_search_queries")]
    pub max_search_queries: usize,

    /// Resume-store database path.
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            minimum_confidence: default_minimum_confidence(),
            max_internal_pages: default_max_internal_pages(),
            max_search_queries: default_max_search_queries(),
            store_path: default_store_path(),
        }
    }
}

fn default_minimum_confidence() -> u8 {
    crate::types::DEFAULT_CONFIDENCE_THRESHOLD
}
fn default_max_internal_pages() -> usize {
    5
}
fn default_max_search_queries() -> usize {
    10
}
fn default_store_path() -> String {
    "~/.prospector/prospector.db".into()
}

/// `[credentials]` section: env var *names*, never the keys themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Env var holding the scraping-service API key.
    #[serde(default = "default_scrape_key_env")]
    pub scrape_api_key_env: String,

    /// Env var holding the language-model API key.
    #[serde(default = "default_model_key_env")]
    pub model_api_key_env: String,

    /// Env var holding the web-search API key (only needed when the search
    /// stage is enabled).
    #[serde(default = "default_search_key_env")]
    pub search_api_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            scrape_api_key_env: default_scrape_key_env(),
            model_api_key_env: default_model_key_env(),
            search_api_key_env: default_search_key_env(),
        }
    }
}

fn default_scrape_key_env() -> String {
    "FIRECRAWL_API_KEY".into()
}
fn default_model_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_search_key_env() -> String {
    "SERP_API_KEY".into()
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDefaults {
    /// Maximum simultaneously in-flight runs.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Consecutive failures before the circuit breaker trips.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Minimum ms between run launches (0 = unthrottled).
    #[serde(default)]
    pub min_task_interval_ms: u64,
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            failure_threshold: default_failure_threshold(),
            min_task_interval_ms: 0,
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_failure_threshold() -> u32 {
    5
}

// ---------------------------------------------------------------------------
// Credentials (resolved, threaded through the run context)
// ---------------------------------------------------------------------------

/// Resolved API credentials for the underlying extraction services.
///
/// Built once via [`resolve_credentials`] and passed by reference; cloned
/// freely across batch tasks. Search key is optional because the search
/// stage is.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub scrape_api_key: String,
    pub model_api_key: String,
    pub search_api_key: Option<String>,
}

impl Credentials {
    /// Check the credentials required by a run are present. Absence is a
    /// fatal configuration error raised before any stage executes.
    pub fn validate(&self, search_enabled: bool) -> Result<()> {
        if self.scrape_api_key.is_empty() {
            return Err(ProspectorError::config("scraping API key is empty"));
        }
        if self.model_api_key.is_empty() {
            return Err(ProspectorError::config("model API key is empty"));
        }
        if search_enabled && self.search_api_key.as_deref().unwrap_or("").is_empty() {
            return Err(ProspectorError::config(
                "search API key is required when the search stage is enabled",
            ));
        }
        Ok(())
    }
}

/// Resolve credentials from the env vars named in config.
///
/// Missing scrape/model keys fail immediately; the search key is resolved
/// to `None` when absent and validated later against the run's sources.
pub fn resolve_credentials(config: &AppConfig) -> Result<Credentials> {
    let scrape_api_key = require_env(&config.credentials.scrape_api_key_env)?;
    let model_api_key = require_env(&config.credentials.model_api_key_env)?;
    let search_api_key = std::env::var(&config.credentials.search_api_key_env)
        .ok()
        .filter(|v| !v.is_empty());

    Ok(Credentials {
        scrape_api_key,
        model_api_key,
        search_api_key,
    })
}

fn require_env(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ProspectorError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.prospector/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProspectorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.prospector/prospector.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ProspectorError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ProspectorError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProspectorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProspectorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProspectorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
