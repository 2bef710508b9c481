//! Error types for the forum engine.

use thiserror::Error;

/// Common error type for forum operations.
///
/// Business-rule outcomes (`Validation`, `NotFound`, `Permission`) are
/// recoverable by the caller. Persistence faults are fatal for the single
/// operation that hit them; see [`ForumError::is_persistence`].
#[derive(Error, Debug)]
pub enum ForumError {
    /// Database error.
    ///
    /// Wraps failures reported by the store, including constraint violations.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ForumError {
    /// Whether this error came from the persistence layer rather than a
    /// business rule.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            ForumError::Database(_) | ForumError::DatabaseConnection(_) | ForumError::Io(_)
        )
    }
}

impl From<sqlx::Error> for ForumError {
    fn from(e: sqlx::Error) -> Self {
        ForumError::Database(e.to_string())
    }
}

/// Result type alias for forum operations.
pub type Result<T> = std::result::Result<T, ForumError>;
