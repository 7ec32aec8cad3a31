#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod constraints;
pub mod error;
pub mod feasible;
pub mod mean_variance;
pub mod objective;
pub mod portfolio;
pub mod solver;

pub use constraints::{
    ConstraintError, Constraints, ConstraintsBuilder, DEFAULT_REGION_LIMIT, Target,
};
pub use error::OptimizerError;
pub use feasible::FeasibleSet;
pub use mean_variance::{
    MeanVarianceOptimizer, MeanVarianceSolution, SolveStatus, optimize_mean_variance,
};
pub use objective::Objective;
pub use portfolio::{MIN_WEIGHT, Portfolio, PortfolioWeight};
pub use solver::{
    AugmentedLagrangian, Problem, SolveOutcome, SolverSettings, stationarity_residual,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
