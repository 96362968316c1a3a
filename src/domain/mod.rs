//! Domain layer - core business logic and types.
//!
//! This layer contains pure domain models, configuration types, error
//! types and the remote backend port, without any IO of its own.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;

pub use backend::DocumentBackend;
pub use config::{AppConfig, LocalConfig, PathConfig, RemoteConfig};
pub use error::{AppError, Result};
pub use models::{AnalysisRecord, Mode, NewRecord, Principal, Timestamp, Verdict};
