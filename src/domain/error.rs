//! Domain-level error types for scan-history.
//!
//! All errors are typed with `thiserror` and provide meaningful context
//! without exposing internal details to end users.

use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Failed to open or query the local database.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid or corrupted data in a store.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Anonymous sign-in against the remote backend failed.
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// The remote store rejected an add operation.
    #[error("Write rejected: {message}")]
    Write { message: String },

    /// Transport or protocol failure talking to the remote store.
    #[error("Remote store error: {message}")]
    Remote {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A background task panicked or was cancelled.
    #[error("Task error: {message}")]
    Task { message: String },
}

impl AppError {
    /// Create a database error from rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create a remote transport error with context.
    pub fn remote(message: impl Into<String>, err: reqwest::Error) -> Self {
        Self::Remote {
            message: format!("{}: {err}", message.into()),
            source: Some(err),
        }
    }

    /// Create a task error from a failed join.
    pub fn task(err: &tokio::task::JoinError) -> Self {
        Self::Task {
            message: err.to_string(),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
