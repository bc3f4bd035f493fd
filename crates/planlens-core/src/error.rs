//! Error types for planlens

use thiserror::Error;

/// Core error type for plan parsing and analysis
#[derive(Error, Debug)]
pub enum PlanError {
    /// The raw plan text is malformed or has no recognizable root operator
    #[error("Failed to parse execution plan: {0}")]
    ParseFailure(String),

    /// No registered parser recognized the raw plan text
    #[error(
        "Unsupported plan format: expected SQL Server showplan XML or PostgreSQL EXPLAIN (FORMAT JSON) output"
    )]
    UnsupportedFormat,

    /// The caller cancelled the operation before it started
    #[error("Cancelled")]
    Cancelled,

    /// The plan source collaborator failed to produce a plan
    #[error("Plan source error: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PlanError {
    /// Returns true if this error represents a user-initiated abort
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Creates a parse failure from any displayable message
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseFailure(message.into())
    }
}

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseFailure(format!("invalid JSON: {err}"))
    }
}

impl From<roxmltree::Error> for PlanError {
    fn from(err: roxmltree::Error) -> Self {
        Self::ParseFailure(format!("invalid XML: {err}"))
    }
}

impl From<toml::de::Error> for PlanError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Result type alias for planlens operations
pub type Result<T> = std::result::Result<T, PlanError>;
