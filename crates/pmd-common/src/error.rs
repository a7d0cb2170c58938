//! Error types for PMD ingestion

use thiserror::Error;

/// Result type alias for PMD operations
pub type Result<T> = std::result::Result<T, PmdError>;

/// Main error type for PMD
#[derive(Error, Debug)]
pub enum PmdError {
    /// The feed document carries no attachments to read
    #[error("Missing input attachment")]
    MissingInput,

    /// A feed row could not be turned into a normalized record
    #[error("Parse error: {message} (line: {line:?})")]
    Parse { line: String, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PmdError {
    /// Build a parse error carrying the offending line
    pub fn parse(line: impl Into<String>, message: impl Into<String>) -> Self {
        PmdError::Parse {
            line: line.into(),
            message: message.into(),
        }
    }

    /// Whether this error should be shown to the feed owner as a validation
    /// failure rather than an internal fault
    pub fn is_user_facing(&self) -> bool {
        matches!(self, PmdError::MissingInput | PmdError::Parse { .. } | PmdError::Decode(_))
    }
}
