//! Configuration loading for the migration binary.

use serde::Deserialize;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string: a `postgres://` / `postgresql://` URL for the
    /// client-server backend, anything else as a single-file store path.
    #[serde(default = "default_url")]
    pub url: String,

    /// Directory holding pre-relational legacy collections, if any.
    #[serde(default = "default_legacy_dir")]
    pub legacy_dir: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "lectern_migrate=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_url() -> String {
    "lectern.db".to_string()
}

fn default_legacy_dir() -> String {
    "legacy".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            legacy_dir: default_legacy_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `LECTERN_DATABASE_URL` overrides `database.url`
/// - `LECTERN_LEGACY_DIR` overrides `database.legacy_dir`
/// - `LECTERN_LOG_LEVEL` overrides `logging.level`
/// - `LECTERN_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(url) = std::env::var("LECTERN_DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(dir) = std::env::var("LECTERN_LEGACY_DIR") {
        config.database.legacy_dir = dir;
    }
    if let Ok(level) = std::env::var("LECTERN_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("LECTERN_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}
