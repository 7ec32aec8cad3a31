//! Regional stock universes.
//!
//! A universe file is a CSV with `ticker` and `name` columns, stored as
//! `{dir}/{REGION}.csv`. Extra columns are ignored.

use crate::error::{PipelineError, Result};
use hobart_scoring::Constituent;
use std::io::Read;
use std::path::Path;

/// Trait for stock universes.
pub trait Universe {
    /// Get all symbols in the universe.
    fn symbols(&self) -> Vec<String>;

    /// Check if a symbol is in the universe.
    fn contains(&self, symbol: &str) -> bool {
        self.symbols().iter().any(|s| s == symbol)
    }

    /// Get the number of constituents.
    fn size(&self) -> usize {
        self.symbols().len()
    }
}

/// Constituents of one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionUniverse {
    region: String,
    constituents: Vec<Constituent>,
}

impl RegionUniverse {
    /// Create a universe from constituents.
    pub fn new(region: impl Into<String>, constituents: Vec<Constituent>) -> Self {
        Self {
            region: region.into(),
            constituents,
        }
    }

    /// Load `{dir}/{region}.csv`.
    pub fn load(dir: &Path, region: &str) -> Result<Self> {
        let path = dir.join(format!("{region}.csv"));
        tracing::debug!(path = %path.display(), "loading universe");
        let reader = csv::Reader::from_path(&path)?;
        Self::collect(region, reader)
    }

    /// Parse a universe CSV from any reader.
    pub fn from_reader<R: Read>(region: &str, reader: R) -> Result<Self> {
        Self::collect(region, csv::Reader::from_reader(reader))
    }

    fn collect<R: Read>(region: &str, mut reader: csv::Reader<R>) -> Result<Self> {
        let mut constituents = Vec::new();
        for row in reader.deserialize::<Constituent>() {
            let mut c = row?;
            c.ticker = c.ticker.trim().to_string();
            c.name = c.name.trim().to_string();
            if !c.ticker.is_empty() {
                constituents.push(c);
            }
        }

        if constituents.is_empty() {
            return Err(PipelineError::EmptyUniverse(region.to_string()));
        }
        Ok(Self::new(region, constituents))
    }

    /// Region code.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// All constituents in file order.
    pub fn constituents(&self) -> &[Constituent] {
        &self.constituents
    }
}

impl Universe for RegionUniverse {
    fn symbols(&self) -> Vec<String> {
        self.constituents.iter().map(|c| c.ticker.clone()).collect()
    }
}
