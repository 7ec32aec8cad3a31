#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod covariance;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod returns;

// Re-export main types
pub use covariance::{
    CovarianceError, CovarianceEstimator, CovarianceMatrix, PairwiseCovariance,
    ensure_positive_semidefinite,
};
pub use engine::{RiskEngine, RiskEngineConfig, RiskReport};
pub use error::RiskError;
pub use metrics::{RiskMetrics, TRADING_DAYS, max_drawdown};
pub use returns::{ReturnsMethod, ReturnsPanel, compute_returns, period_returns};
