//! Position-capped selection from ranked region candidates.

use hobart_optimizer::Constraints;
use hobart_scoring::RegionCandidates;
use std::collections::HashSet;

/// Region cap assumed by the selector when a region has no explicit limit.
pub const SELECTION_DEFAULT_REGION_LIMIT: f64 = 0.25;

/// Ordered `(ticker, region)` pairs chosen for optimization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Selected tickers
    pub tickers: Vec<String>,
    /// Region of each ticker, parallel to `tickers`
    pub regions: Vec<String>,
}

impl Selection {
    /// Number of selected tickers.
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    /// True when nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Iterate over `(ticker, region)` pairs in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tickers
            .iter()
            .map(String::as_str)
            .zip(self.regions.iter().map(String::as_str))
    }

    /// Region of `ticker`, if selected.
    pub fn region_of(&self, ticker: &str) -> Option<&str> {
        self.iter().find(|(t, _)| *t == ticker).map(|(_, r)| r)
    }

    fn push(&mut self, ticker: String, region: String) {
        self.tickers.push(ticker);
        self.regions.push(region);
    }
}

/// Positions a region can hold: `max(1, floor(region_limit / position_limit))`.
pub fn max_positions(region_limit: f64, position_limit: f64) -> usize {
    ((region_limit / position_limit).floor() as usize).max(1)
}

/// Take the top candidates of each region, in blob order.
///
/// Each region contributes up to [`max_positions`] of its leading candidates,
/// using its explicit limit or [`SELECTION_DEFAULT_REGION_LIMIT`]. A ticker
/// already taken by an earlier region is skipped.
pub fn select_candidates(blobs: &[RegionCandidates], constraints: &Constraints) -> Selection {
    let mut selection = Selection::default();
    let mut seen = HashSet::new();

    for blob in blobs.iter().filter(|b| !b.candidates.is_empty()) {
        let limit = constraints
            .explicit_region_limit(&blob.region)
            .unwrap_or(SELECTION_DEFAULT_REGION_LIMIT);
        let take = max_positions(limit, constraints.position_limit()).min(blob.candidates.len());

        for candidate in &blob.candidates[..take] {
            if !seen.insert(candidate.ticker.clone()) {
                tracing::debug!(ticker = %candidate.ticker, region = %blob.region, "duplicate ticker skipped");
                continue;
            }
            selection.push(candidate.ticker.clone(), blob.region.clone());
        }
    }

    tracing::debug!(selected = selection.len(), regions = blobs.len(), "candidate selection");
    selection
}
