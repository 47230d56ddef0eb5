//! Configuration management for folo-sync.
//!
//! Configuration is read from `~/.config/folo-sync/config.toml` at startup
//! (or the path given with `--config`). If the file doesn't exist, a default
//! configuration with comments is created.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::migrate::RecoveryPolicy;
use crate::optimistic::ErrorConfig;
use crate::sync::{parse_interval, ResyncConfig};

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub mutation: MutationDefaults,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Sent as a bearer token; never logged.
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.follow.is".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `None` uses the platform data directory.
    pub path: Option<PathBuf>,
    pub recovery: RecoveryPolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub page_size: u32,
    /// Interval string like "1h", "30m", "1d"
    pub resync_interval: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            resync_interval: "1h".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn resync(&self) -> Result<ResyncConfig, ConfigError> {
        let interval_secs = parse_interval(&self.resync_interval).map_err(ConfigError::Invalid)?;
        Ok(ResyncConfig {
            interval_secs,
            ..ResyncConfig::default()
        })
    }
}

/// Error handling defaults for optimistic mutations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MutationDefaults {
    pub show_toast: bool,
    pub retryable: bool,
    pub max_retries: u32,
}

impl Default for MutationDefaults {
    fn default() -> Self {
        let defaults = ErrorConfig::default();
        Self {
            show_toast: defaults.show_toast,
            retryable: defaults.retryable,
            max_retries: defaults.max_retries,
        }
    }
}

impl MutationDefaults {
    pub fn error_config(&self) -> ErrorConfig {
        ErrorConfig {
            show_toast: self.show_toast,
            custom_message: None,
            retryable: self.retryable,
            max_retries: self.max_retries,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        // Surface a bad interval at startup rather than when `watch` runs.
        config.sync.resync()?;
        Ok(config)
    }

    /// Get the default config file path: `~/.config/folo-sync/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("folo-sync").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> &'static str {
        r##"# folo-sync Configuration

[api]
# Base URL of the Folo API
base_url = "https://api.follow.is"

# Bearer token for the account to sync (leave unset for anonymous access)
# token = "..."

# Request timeout in seconds
timeout_secs = 30

[database]
# Local database file (default: <data dir>/folo-sync/folo.db)
# path = "/path/to/folo.db"

# What to do when the database cannot be migrated:
# "abort" leaves the file alone and fails,
# "backup_and_recreate" moves it aside and starts empty.
recovery = "abort"

[sync]
# Entries fetched per page
page_size = 20

# How often `watch` resets unread counters from the server ("30m", "1h", "1d")
resync_interval = "1h"

[mutation]
# Report failed optimistic updates to the user
show_toast = true

# Retry failed mutations with exponential backoff
retryable = false
max_retries = 3
"##
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let config: Config =
            toml::from_str(Config::default_config_content()).expect("Default config should be valid TOML");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[api]
token = "abc"

[database]
recovery = "backup_and_recreate"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.api.token.as_deref(), Some("abc"));
        assert_eq!(config.database.recovery, RecoveryPolicy::BackupAndRecreate);
        // Defaults
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.sync.page_size, 20);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.sync.resync().unwrap().interval_secs, 3600);
        assert_eq!(config.mutation.error_config(), ErrorConfig::default());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_load_rejects_bad_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sync]\nresync_interval = \"often\"\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
