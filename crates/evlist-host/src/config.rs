//! Host configuration loading from file and environment variables.

use serde::Deserialize;
use thiserror::Error;

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// List construction settings.
    #[serde(default)]
    pub lists: ListsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings applied when the host creates lists.
#[derive(Debug, Clone, Deserialize)]
pub struct ListsConfig {
    /// Capacity reserved for lists created without a size hint.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,

    /// Category whose shared lock and publisher every created list uses.
    /// `None` gives each list its own lock and publisher.
    #[serde(default)]
    pub category: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "evlist_core=trace,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_initial_capacity() -> usize {
    evlist_core::DEFAULT_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
            category: None,
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

/// Parses configuration from TOML text, without environment overrides.
///
/// # Errors
///
/// Returns `ConfigError::Parse` if the text is not valid configuration.
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(contents)?)
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `EVLIST_INITIAL_CAPACITY` overrides `lists.initial_capacity`
/// - `EVLIST_CATEGORY` overrides `lists.category` (empty clears it)
/// - `EVLIST_LOG_LEVEL` overrides `logging.level`
/// - `EVLIST_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => parse_config(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(capacity) = std::env::var("EVLIST_INITIAL_CAPACITY") {
        if let Ok(parsed) = capacity.parse() {
            config.lists.initial_capacity = parsed;
        }
    }
    if let Ok(category) = std::env::var("EVLIST_CATEGORY") {
        config.lists.category = if category.trim().is_empty() {
            None
        } else {
            Some(category)
        };
    }
    if let Ok(level) = std::env::var("EVLIST_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("EVLIST_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}
