//! Glue between the CLI and the Hobart library crates.

pub(crate) mod cache_manager;
pub(crate) mod sources;
