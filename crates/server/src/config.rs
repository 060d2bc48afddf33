//! # Application Configuration
//!
//! This module defines the configuration structure for the `engagement-server` and
//! provides the logic for loading it from an optional `config.yml` file and
//! environment variables.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use engagement::{
    constants::{DEFAULT_DB_FILE, DEFAULT_LOOKBACK_DAYS},
    ingest::DEFAULT_DATA_API_URL,
};
use regex::Regex;
use serde::Deserialize;
use std::{env, fs, path::Path};
use tracing::info;

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates an explicitly requested configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT` env var.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The path to the SQLite database file. Loaded from `DB_URL` env var.
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// The directory holding `model.json` and `metrics.json`. Loaded from `ARTIFACT_DIR`.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,
    /// The trailing window, in days, for features and dashboards.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default)]
    pub textbook: TextbookConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// The textbook server the manual import pulls from.
#[derive(Debug, Deserialize, Clone)]
pub struct TextbookConfig {
    #[serde(default = "default_data_api_url")]
    pub data_api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TextbookConfig {
    fn default() -> Self {
        Self {
            data_api_url: default_data_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// The single dashboard account. Login is refused while either field is unset.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_port() -> u16 {
    8000
}

fn default_db_url() -> String {
    DEFAULT_DB_FILE.to_string()
}

fn default_artifact_dir() -> String {
    ".".to_string()
}

fn default_lookback_days() -> i64 {
    DEFAULT_LOOKBACK_DAYS
}

fn default_data_api_url() -> String {
    DEFAULT_DATA_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    8
}

// Helper to read a file, substitute env vars, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(e.to_string()))?;
    let expanded_content = re.replace_all(&content, |caps: &regex::Captures| {
        let var_name = &caps["var"];
        env::var(var_name).unwrap_or_default()
    });

    Ok(Some(expanded_content.to_string()))
}

/// Loads the application configuration from a file and environment variables.
///
/// - Without an override, `config.yml` next to the crate manifest is used when present.
/// - Top-level keys like `port` and `db_url` are overridden by `PORT` and `DB_URL`.
/// - Nested keys are overridden by `ENGAGEMENT_...` variables
///   (e.g., `ENGAGEMENT_TEXTBOOK__DATA_API_URL`).
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    let config_path = match config_path_override {
        Some(path) => path.to_string(),
        None => format!("{}/config.yml", env!("CARGO_MANIFEST_DIR")),
    };
    match read_and_substitute(&config_path)? {
        Some(content) => {
            info!("Loading configuration from '{config_path}'.");
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if config_path_override.is_some() => {
            return Err(ConfigError::NotFound(format!(
                "Config file not found at '{config_path}'."
            )));
        }
        None => info!("'{config_path}' not found. Using defaults and environment."),
    }

    let settings = builder
        // Top-level keys such as PORT and DB_URL.
        .add_source(Environment::default())
        // Prefixed variables for nested overrides.
        .add_source(
            Environment::with_prefix("ENGAGEMENT")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
