//! Error types for Posture

use thiserror::Error;

/// Result type alias using Posture Error
pub type Result<T> = std::result::Result<T, Error>;

/// Posture error types
#[derive(Error, Debug)]
pub enum Error {
    // === Collection Errors ===
    #[error("Host identity unavailable: {0}")]
    IdentityUnavailable(String),

    // === Check Errors ===
    #[error("Check not found: {check_id}")]
    CheckNotFound { check_id: String },

    #[error("Duplicate check id: {check_id}")]
    DuplicateCheck { check_id: String },

    #[error("Invalid check definition: {path} - {message}")]
    InvalidCheckDefinition { path: String, message: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Check if this error is fatal (should stop the collection run)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::IdentityUnavailable(_)
                | Error::Configuration(_)
                | Error::InvalidConfig { .. }
        )
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::IdentityUnavailable(_) => "IDENTITY_UNAVAILABLE",
            Error::CheckNotFound { .. } => "CHECK_NOT_FOUND",
            Error::DuplicateCheck { .. } => "DUPLICATE_CHECK",
            Error::InvalidCheckDefinition { .. } => "INVALID_CHECK_DEF",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::InvalidConfig { .. } => "INVALID_CONFIG",
            Error::Io(_) => "IO_ERROR",
            Error::FileNotFound { .. } => "FILE_NOT_FOUND",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
