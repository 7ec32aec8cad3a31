//! Error types for scoring.

use thiserror::Error;

/// Errors raised while building or scoring feature tables.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Polars operation failed
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// A required column is missing from the feature table
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A distribution could not be built
    #[error("Invalid distribution parameters: {0}")]
    Distribution(String),
}

/// Result alias for scoring operations.
pub type Result<T> = std::result::Result<T, ScoringError>;
