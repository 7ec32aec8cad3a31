#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod estimator;
pub mod macro_tilt;
pub mod pipeline;
pub mod screener;
pub mod selection;
pub mod universe;

// Re-export main types from sub-crates
pub use hobart_data as data;
pub use hobart_optimizer as optimizer;
pub use hobart_output as output;
pub use hobart_risk as risk;
pub use hobart_scoring as scoring;

pub use crate::config::{AppConfig, ConfigError};
pub use error::{PipelineError, Result};
pub use estimator::{Estimate, ReturnsEstimator, ReturnsSource, SyntheticReturns};
pub use macro_tilt::region_tilt;
pub use pipeline::{NO_SELECTION, PortfolioPipeline, optimize_portfolio};
pub use screener::{RegionScreener, ScreenOutcome, ScreenSettings};
pub use selection::{Selection, max_positions, select_candidates};
pub use universe::{RegionUniverse, Universe};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
