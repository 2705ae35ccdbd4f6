//! Database error types.

use phoneprov_core::token::RedeemDenied;
use thiserror::Error;

/// Database error type.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Domain(#[from] phoneprov_core::Error),

    #[error("Token refused: {}", .0.as_str())]
    TokenDenied(RedeemDenied),
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
