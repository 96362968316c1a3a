//! Startup choice between the remote and local store.
//!
//! Selection runs once per process. Any remote initialization failure
//! degrades to local mode with a single warning; it is never retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::{AppConfig, AppError, Mode, RemoteConfig, Result};
use crate::infrastructure::FirestoreClient;

use super::local_store::LocalStore;
use super::remote_store::RemoteStore;

/// Set once a remote connection has been initialized in this process.
static REMOTE_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Outcome of mode selection: the frozen mode plus both store handles.
pub struct ModeSelection {
    remote: Option<RemoteStore>,
    local: LocalStore,
}

impl ModeSelection {
    /// Whether the remote store is in use.
    #[must_use]
    pub const fn using_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// The selected mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        if self.using_remote() {
            Mode::Remote
        } else {
            Mode::Local
        }
    }

    /// The remote store, when selected.
    #[must_use]
    pub const fn remote(&self) -> Option<&RemoteStore> {
        self.remote.as_ref()
    }

    /// The local store; always valid, used only in local mode.
    #[must_use]
    pub const fn local(&self) -> &LocalStore {
        &self.local
    }

    pub(crate) fn into_parts(self) -> (Option<RemoteStore>, LocalStore) {
        (self.remote, self.local)
    }
}

/// Decides once whether remote persistence is viable.
pub struct ModeSelector;

impl ModeSelector {
    /// Open the local store and try to bring up the remote one.
    ///
    /// # Errors
    /// Returns error only if the local store cannot be opened. Remote
    /// failures select local mode instead.
    pub fn select(config: &AppConfig) -> Result<ModeSelection> {
        let local = LocalStore::open(&config.local_db_path(), config.local.slot.clone())?;

        let remote = match Self::init_remote(&config.remote) {
            Ok(remote) => {
                tracing::info!(project = %config.remote.project_id, "Using remote store");
                Some(remote)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote initialization failed, switching to local mode");
                None
            }
        };

        Ok(ModeSelection { remote, local })
    }

    fn init_remote(config: &RemoteConfig) -> Result<RemoteStore> {
        if !config.has_credentials() {
            return Err(AppError::Config {
                message: "No API key provided".into(),
            });
        }

        let client = FirestoreClient::new(config.clone())?;

        if REMOTE_INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(AppError::Config {
                message: "Remote connection already initialized in this process".into(),
            });
        }

        Ok(RemoteStore::new(Arc::new(client), config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PathConfig;
    use tempfile::tempdir;

    fn config(dir: &tempfile::TempDir, api_key: &str) -> AppConfig {
        let mut config = AppConfig {
            paths: PathConfig {
                data_dir: Some(dir.path().to_path_buf()),
            },
            ..Default::default()
        };
        config.remote.api_key = api_key.into();
        config
    }

    #[test]
    fn test_empty_key_selects_local() {
        let dir = tempdir().unwrap();
        let selection = ModeSelector::select(&config(&dir, "")).unwrap();

        assert!(!selection.using_remote());
        assert_eq!(selection.mode(), Mode::Local);
        assert!(selection.remote().is_none());
        assert!(dir.path().join("history.db").exists());
    }

    #[test]
    fn test_second_initialization_falls_back() {
        let dir = tempdir().unwrap();
        let config = config(&dir, "AIzaSyExample");

        // Only one call per process can claim the remote connection.
        let _first = ModeSelector::select(&config).unwrap();
        let second = ModeSelector::select(&config).unwrap();

        assert!(!second.using_remote());
        assert_eq!(second.mode(), Mode::Local);
    }
}
