//! Error types for the portfolio pipeline.

use hobart_data::DataError;
use hobart_optimizer::OptimizerError;
use hobart_risk::{CovarianceError, RiskError};
use hobart_scoring::ScoringError;
use thiserror::Error;

/// Errors raised while screening, estimating or optimizing.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Data source failure
    #[error(transparent)]
    Data(#[from] DataError),

    /// Feature or score computation failure
    #[error(transparent)]
    Scoring(#[from] ScoringError),

    /// Labelled risk structure failure
    #[error(transparent)]
    Risk(#[from] RiskError),

    /// Covariance repair failure
    #[error(transparent)]
    Covariance(#[from] CovarianceError),

    /// Optimizer rejected its inputs
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// Synthetic return parameters are invalid
    #[error("Invalid synthetic return distribution: {0}")]
    Synthetic(#[from] rand_distr::NormalError),

    /// Universe file could not be read
    #[error("Universe error: {0}")]
    Universe(#[from] csv::Error),

    /// Universe file has no usable rows
    #[error("Universe {0} is empty")]
    EmptyUniverse(String),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
