//! Configuration file management.
//!
//! Handles loading and creating TOML configuration files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Scan History Configuration
# Auto-generated - edit as needed

[remote]
# Web API key of the hosted project. Leave empty to keep history local.
api_key = ""
project_id = "deepfake-detector-demo"

# Collection holding analysis records
collection = "scans"

# Number of records in the live history view
history_limit = 10

# History refresh interval in milliseconds
poll_interval_ms = 2000

# Per-request timeout in seconds
request_timeout_secs = 30

[local]
# Key/value slot holding the local record array
slot = "demo_scans"

# Database file inside the data directory
database = "history.db"

[paths]
# Custom data directory (optional, defaults to ~/.scan-history)
# data_dir = "/custom/path"
"#;

/// Load configuration from file or fall back to defaults.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config() -> Result<AppConfig> {
    let config_path = config_file_path();

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Create the commented default configuration file if it doesn't exist.
///
/// Returns `true` when a new file was written.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(config_path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %config_path.display(), "Created default configuration");

    Ok(true)
}

/// Get the path to the default configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_data_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(!config.remote.has_credentials());
        assert_eq!(config.remote.history_limit, 10);
        assert_eq!(config.remote.collection, "scans");
        assert_eq!(config.local.slot, "demo_scans");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("[remote]\napi_key = \"abc\"\n").unwrap();
        assert!(config.remote.has_credentials());
        assert_eq!(config.remote.poll_interval_ms, 2000);
        assert_eq!(config.local.database, "history.db");
    }

    #[test]
    fn test_older_file_with_auth_domain_still_loads() {
        let config: AppConfig = toml::from_str(
            "[remote]\napi_key = \"abc\"\nauth_domain = \"demo.firebaseapp.com\"\n",
        )
        .unwrap();
        assert!(config.remote.has_credentials());
        assert_eq!(config.remote.token_endpoint, "https://securetoken.googleapis.com/v1");
        assert!(!DEFAULT_CONFIG.contains("auth_domain"));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.remote.history_limit = 25;
        fs::write(&config_path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = load_config_from_file(&config_path).unwrap();

        assert_eq!(loaded.remote.history_limit, 25);
        assert_eq!(loaded.local.slot, config.local.slot);
    }

    #[test]
    fn test_ensure_config_exists_writes_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(ensure_config_exists(&path).unwrap());
        assert!(!ensure_config_exists(&path).unwrap());
        assert!(load_config_from_file(&path).is_ok());
    }
}
