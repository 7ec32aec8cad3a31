#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod report;

pub use export::{ExportError, ExportFormat, Exporter};
pub use report::{DEFAULT_TOP_PER_REGION, Report, ReportBuilder, ReportError};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
