//! Configuration types for snapreplay

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{Result, SnapError};

/// Default snapshot directory, relative to the working directory
pub const DEFAULT_SNAPSHOT_DIR: &str = "__snapshots__";

/// Environment variable selecting the operating mode
pub const ENV_MODE: &str = "SNAPSHOT_MODE";
/// Environment variable selecting the snapshot directory
pub const ENV_DIR: &str = "SNAPSHOT_DIR";
/// Environment variable enabling store read/write logging
pub const ENV_LOG: &str = "SNAPSHOT_LOG";
/// Environment variable selecting request logging
pub const ENV_LOG_REQUESTS: &str = "SNAPSHOT_LOG_REQUESTS";

/// Operating mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Mode {
    /// Serve every request from snapshots; a miss is fatal
    #[default]
    Read,
    /// Always go live and overwrite snapshots
    Update,
    /// Serve existing snapshots, capture missing ones
    Append,
    /// Bypass snapshots entirely
    Ignore,
}

impl Mode {
    /// Parse a configuration value, falling back to [`Mode::Read`]
    #[must_use]
    pub fn from_config_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "read" => Mode::Read,
            "update" => Mode::Update,
            "append" => Mode::Append,
            "ignore" => Mode::Ignore,
            other => {
                warn!("Unrecognized snapshot mode '{other}', falling back to read");
                Mode::Read
            }
        }
    }

    /// Name of the mode as used in configuration
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Read => "read",
            Mode::Update => "update",
            Mode::Append => "append",
            Mode::Ignore => "ignore",
        }
    }
}

impl From<String> for Mode {
    fn from(value: String) -> Self {
        Mode::from_config_value(&value)
    }
}

/// Verbosity of per-request logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestLogLevel {
    /// Method and URL only
    Summary,
    /// Method, URL, headers and body
    Detailed,
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Operating mode
    #[serde(default)]
    pub mode: Mode,
    /// Root directory holding snapshot files
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
    /// Log every store read and write
    #[serde(default)]
    pub log_store_access: bool,
    /// Log every observed request
    #[serde(default)]
    pub log_requests: Option<RequestLogLevel>,
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_DIR)
}

impl Config {
    /// Create a configuration with logging disabled
    pub fn new(mode: Mode, snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            snapshot_dir: snapshot_dir.into(),
            log_store_access: false,
            log_requests: None,
        }
    }

    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SnapError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| SnapError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = lookup(ENV_MODE)
            .map(|value| Mode::from_config_value(&value))
            .unwrap_or_default();
        let snapshot_dir = lookup(ENV_DIR)
            .filter(|value| !value.is_empty())
            .map_or_else(default_snapshot_dir, PathBuf::from);
        let log_store_access = lookup(ENV_LOG).is_some_and(|value| {
            matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
        });
        let log_requests = lookup(ENV_LOG_REQUESTS).and_then(|value| {
            match value.to_ascii_lowercase().as_str() {
                "summary" => Some(RequestLogLevel::Summary),
                "detailed" => Some(RequestLogLevel::Detailed),
                _ => None,
            }
        });

        let config = Self {
            mode,
            snapshot_dir,
            log_store_access,
            log_requests,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_dir.as_os_str().is_empty() {
            return Err(SnapError::ConfigError(
                "snapshot_dir cannot be empty".to_string(),
            ));
        }

        // Missing directories are created on first write
        if self.snapshot_dir.exists() && !self.snapshot_dir.is_dir() {
            return Err(SnapError::ConfigError(format!(
                "Snapshot path is not a directory: {}",
                self.snapshot_dir.display()
            )));
        }

        Ok(())
    }
}
