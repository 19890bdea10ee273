//! Error types for the AutoDPIA tooling.
//!
//! One enum covers every failure category: configuration, I/O, HTTP,
//! authentication, template load/save, name conflicts, background tasks
//! and editor misuse.

use thiserror::Error;

/// Unified error type for the AutoDPIA tooling.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level or unexpected HTTP status errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Missing, invalid or expired credentials
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Template list or template body could not be fetched or parsed
    #[error("Load error: {0}")]
    Load(String),

    /// Structure could not be persisted
    #[error("Save error: {0}")]
    Save(String),

    /// A name (template, step or part) already exists
    #[error("Name conflict: {0}")]
    NameConflict(String),

    /// Background task failed or was cancelled
    #[error("Task error: {0}")]
    Task(String),

    /// Editor operation not permitted in the current state
    #[error("Template error: {0}")]
    Template(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Whether this error is a name conflict the user must resolve.
    pub fn is_name_conflict(&self) -> bool {
        matches!(self, AppError::NameConflict(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
