use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_ENV: &str = "SONGTRACKER_ENDPOINT";
pub const API_KEY_ENV: &str = "SONGTRACKER_API_KEY";

/// Errors that can occur while loading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No home directory could be resolved for the default config location
    #[error("failed to obtain user's directories")]
    DirectoriesNotFound,
    #[error("config file not found at {0:?}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    IoError(#[from] std::io::Error),
    #[error("failed to deserialize config: {0}")]
    DeserializeError(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    /// A required value is empty after the file and environment were applied
    #[error("`{0}` is not configured (set it in config.toml or via {1})")]
    Missing(&'static str, &'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where reports are POSTed
    pub endpoint: String,
    /// Sent as the `X-API-Key` header
    pub api_key: String,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Program and arguments of the media source helper. Empty means events
    /// are read from stdin.
    pub command: Vec<String>,
}

impl Config {
    /// Overlay values from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(std::env::var(ENDPOINT_ENV).ok(), std::env::var(API_KEY_ENV).ok());
    }

    fn apply_overrides(&mut self, endpoint: Option<String>, api_key: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|v| !v.is_empty()) {
            log::info!("Using endpoint from {}", ENDPOINT_ENV);
            self.endpoint = endpoint;
        }
        if let Some(api_key) = api_key.filter(|v| !v.is_empty()) {
            self.api_key = api_key;
        }
    }

    /// Both collaborators must be supplied before anything can be reported
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("endpoint", ENDPOINT_ENV));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("api_key", API_KEY_ENV));
        }
        Ok(())
    }
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    match ProjectDirs::from("com", "songtracker", "songtracker") {
        Some(dirs) => Ok(dirs.config_dir().join("config.toml")),
        None => Err(ConfigError::DirectoriesNotFound),
    }
}

/// Read a config file. An explicit path must exist; the default location is
/// created with an empty template on first run.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            read_config(path)?
        }
        None => {
            let path = default_config_path()?;
            if path.exists() {
                read_config(&path)?
            } else {
                write_default_config(&path)?
            }
        }
    };

    config.apply_env();
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    log::info!("Loading configuration from {path:?}");
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

fn write_default_config(path: &Path) -> Result<Config, ConfigError> {
    log::info!("No configuration found, writing a template to {path:?}");
    let config = Config::default();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&config)?)?;
    Ok(config)
}
