//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/devicehub/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/devicehub/` (~/.config/devicehub/)
//! - Data: `$XDG_DATA_HOME/devicehub/` (~/.local/share/devicehub/)
//! - State/Logs: `$XDG_STATE_HOME/devicehub/` (~/.local/state/devicehub/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Database location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Device API behavior
    #[serde(default)]
    pub devices: DevicesConfig,
}

/// Database configuration
#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Override for the SQLite file (defaults to the XDG data dir)
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Device API behavior
#[derive(Debug, Deserialize)]
pub struct DevicesConfig {
    /// Report an empty device list as `DeviceNotFound` (historical behavior).
    /// When false, an empty list is a normal result, as for users.
    #[serde(default = "default_empty_list_is_error")]
    pub empty_list_is_error: bool,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            empty_list_is_error: default_empty_list_is_error(),
        }
    }
}

fn default_empty_list_is_error() -> bool {
    true
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.logging.max_files == 0 {
            return Err(Error::Config(
                "logging.max_files must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The database file to use: `database.path` if set, else the default.
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/devicehub/config.toml` (~/.config/devicehub/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("devicehub").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/devicehub/` (~/.local/share/devicehub/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("devicehub")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/devicehub/` (~/.local/state/devicehub/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("devicehub")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/devicehub/devicehub.db` (~/.local/share/devicehub/devicehub.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("devicehub.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database.path.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.max_files, 5);
        assert!(config.devices.empty_list_is_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
path = "/tmp/devicehub-test.db"

[logging]
level = "debug"

[devices]
empty_list_is_error = false
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(
            config.resolved_database_path(),
            PathBuf::from("/tmp/devicehub-test.db")
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.max_files, 5);
        assert!(!config.devices.empty_list_is_error);
    }

    #[test]
    fn test_load_from_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[logging]\nmax_files = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, "[logging\nlevel = ").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_paths() {
        assert!(Config::database_path().ends_with("devicehub/devicehub.db"));
        assert!(Config::config_path().ends_with("devicehub/config.toml"));
    }
}
