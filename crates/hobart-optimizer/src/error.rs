//! Error types for the optimizer.

use crate::constraints::ConstraintError;
use hobart_risk::RiskError;
use thiserror::Error;

/// Errors that can occur before optimization starts.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// No assets to optimize
    #[error("Cannot optimize an empty universe")]
    EmptyUniverse,

    /// Tickers and regions differ in length
    #[error("Got {tickers} tickers but {regions} regions")]
    LengthMismatch {
        /// Number of tickers
        tickers: usize,
        /// Number of regions
        regions: usize,
    },

    /// Covariance contains NaN or infinity
    #[error("Covariance matrix has non-finite entries")]
    NonFiniteCovariance,

    /// Covariance could not be aligned to the tickers
    #[error(transparent)]
    Risk(#[from] RiskError),

    /// Invalid constraints
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}
