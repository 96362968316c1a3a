//! Configuration types.
//!
//! Holds the remote backend bundle, the local fallback store settings and
//! path overrides. Every field has a default so partial files parse.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Connection bundle for the remote document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Web API key. Empty means no backend is configured.
    #[serde(default)]
    pub api_key: String,

    /// Project identifier.
    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Base URL of the document REST API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Base URL of the identity REST API.
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,

    /// Base URL of the token refresh API.
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    /// Collection holding analysis records.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Number of most recent records in the live history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Interval between history refreshes in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: default_project_id(),
            endpoint: default_endpoint(),
            auth_endpoint: default_auth_endpoint(),
            token_endpoint: default_token_endpoint(),
            collection: default_collection(),
            history_limit: default_history_limit(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    /// Whether the credential required for sign-in is present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

fn default_project_id() -> String {
    "deepfake-detector-demo".into()
}

fn default_endpoint() -> String {
    "https://firestore.googleapis.com/v1".into()
}

fn default_auth_endpoint() -> String {
    "https://identitytoolkit.googleapis.com/v1".into()
}

fn default_token_endpoint() -> String {
    "https://securetoken.googleapis.com/v1".into()
}

fn default_collection() -> String {
    "scans".into()
}

const fn default_history_limit() -> usize {
    10
}

const fn default_poll_interval_ms() -> u64 {
    2000
}

const fn default_request_timeout_secs() -> u64 {
    30
}

/// Settings for the local fallback store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Name of the key/value slot holding the record array.
    #[serde(default = "default_slot")]
    pub slot: String,

    /// Database file name inside the data directory.
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            slot: default_slot(),
            database: default_database(),
        }
    }
}

fn default_slot() -> String {
    "demo_scans".into()
}

fn default_database() -> String {
    "history.db".into()
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Remote backend configuration.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local fallback store configuration.
    #[serde(default)]
    pub local: LocalConfig,

    /// Path configuration.
    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".scan-history")
    }

    /// Get the local store database path.
    #[must_use]
    pub fn local_db_path(&self) -> PathBuf {
        self.data_dir().join(&self.local.database)
    }

    /// Copy suitable for display, with the API key masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.remote.has_credentials() {
            config.remote.api_key = "<redacted>".into();
        }
        config
    }
}
