use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during config operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

pub const DEFAULT_SELECTOR: &str = "process in (console, shell)";

/// Application configuration
///
/// Every field can be overridden on the command line or through a
/// `PODSESSION_*` environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Kubeconfig to read contexts from
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// Label selector for candidate workloads
    #[serde(default = "default_selector")]
    pub selector: String,

    /// Minutes a session pod may live without a heartbeat
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,

    /// Default resource limits, e.g. `cpu=500m,memory=1Gi`
    #[serde(default)]
    pub limits: Option<String>,

    /// Default image override
    #[serde(default)]
    pub image: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            selector: default_selector(),
            idle_timeout: default_idle_timeout(),
            limits: None,
            image: None,
        }
    }
}

fn default_selector() -> String {
    DEFAULT_SELECTOR.to_string()
}

fn default_idle_timeout() -> u64 {
    15
}

impl AppConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join("podsession"))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load configuration from `path`, or from the default location
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::config_path()?),
        }
    }

    /// Load configuration from a file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;

        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout * 60)
    }
}
