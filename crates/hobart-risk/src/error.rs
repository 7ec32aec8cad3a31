//! Error types for risk computations.

use crate::covariance::CovarianceError;
use thiserror::Error;

/// Errors raised while building labelled risk structures.
#[derive(Debug, Error)]
pub enum RiskError {
    /// Covariance estimation failed
    #[error(transparent)]
    Covariance(#[from] CovarianceError),

    /// Labels do not match the value matrix
    #[error("Shape mismatch: {labels} labels for a {rows}x{cols} matrix")]
    ShapeMismatch {
        /// Number of labels
        labels: usize,
        /// Matrix rows
        rows: usize,
        /// Matrix columns
        cols: usize,
    },

    /// A requested ticker is not in the matrix
    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),
}
