//! Error types for phoneprov core.

use thiserror::Error;

/// Core error type for phoneprov operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Invalid variable key: {0} (expected uppercase A-Z, 0-9, _)")]
    InvalidVariableKey(String),

    #[error("Validation failed for {name}: {reason}")]
    ValidationFailed { name: String, reason: String },
}

impl Error {
    /// Build a `ValidationFailed` error for a template variable.
    #[must_use]
    pub fn validation(name: &str, reason: impl Into<String>) -> Self {
        Self::ValidationFailed { name: name.to_string(), reason: reason.into() }
    }
}

/// Result type alias for phoneprov core operations.
pub type Result<T> = std::result::Result<T, Error>;
