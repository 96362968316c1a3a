//! Infrastructure layer - external adapters (database, network, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod firestore;
pub mod local_storage;

pub use config::{config_file_path, ensure_config_exists, load_config, load_config_from_file};
pub use firestore::FirestoreClient;
pub use local_storage::LocalStorage;
