//! Selection, estimation and optimization into a portfolio.

use crate::{
    error::Result,
    estimator::ReturnsEstimator,
    selection::{Selection, select_candidates},
};
use chrono::NaiveDate;
use hobart_data::PricePanel;
use hobart_optimizer::{Constraints, MeanVarianceOptimizer, Portfolio};
use hobart_scoring::RegionCandidates;

/// Notes on a portfolio built from no candidates.
pub const NO_SELECTION: &str = "no selection";

/// Portfolio construction pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortfolioPipeline {
    estimator: ReturnsEstimator,
    optimizer: MeanVarianceOptimizer,
}

impl PortfolioPipeline {
    /// Create a pipeline from its stages.
    pub const fn new(estimator: ReturnsEstimator, optimizer: MeanVarianceOptimizer) -> Self {
        Self {
            estimator,
            optimizer,
        }
    }

    /// Build the portfolio for `blobs`.
    ///
    /// Candidates are selected per region, μ and Σ are estimated from `prices`
    /// (or the synthetic fallback) and the optimizer weights are rounded into a
    /// [`Portfolio`]. With nothing selected the result is all cash.
    pub fn optimize(
        &self,
        blobs: &[RegionCandidates],
        prices: Option<&PricePanel>,
        constraints: &Constraints,
        as_of: NaiveDate,
    ) -> Result<Portfolio> {
        let selection = select_candidates(blobs, constraints);
        if selection.is_empty() {
            tracing::info!("no candidates selected; holding cash");
            return Ok(Portfolio::all_cash(as_of, constraints, NO_SELECTION));
        }

        let estimate = self.estimator.estimate(&selection.tickers, prices)?;
        let regions = regions_for(&selection, &estimate.tickers);

        let solution = self.optimizer.optimize(
            &estimate.tickers,
            &regions,
            Some(&estimate.expected_returns),
            &estimate.covariance,
            constraints,
        )?;

        let mut notes = format!("mean-variance ({})", estimate.source.label());
        if solution.status.is_fallback() {
            notes.push_str("; solver fallback to initial weights");
        }

        let portfolio = Portfolio::from_weights(
            as_of,
            &estimate.tickers,
            &regions,
            &solution.weights,
            constraints,
            notes,
        );
        tracing::info!(
            positions = portfolio.weights.len(),
            cash = portfolio.cash_weight,
            source = estimate.source.label(),
            "portfolio optimized"
        );
        Ok(portfolio)
    }
}

fn regions_for(selection: &Selection, tickers: &[String]) -> Vec<String> {
    tickers
        .iter()
        .map(|t| selection.region_of(t).unwrap_or_default().to_string())
        .collect()
}

/// Build a portfolio with the default pipeline.
///
/// See [`PortfolioPipeline::optimize`].
pub fn optimize_portfolio(
    blobs: &[RegionCandidates],
    prices: Option<&PricePanel>,
    constraints: &Constraints,
    as_of: NaiveDate,
) -> Result<Portfolio> {
    PortfolioPipeline::default().optimize(blobs, prices, constraints, as_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hobart_scoring::Candidate;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 7).unwrap()
    }

    #[test]
    fn test_no_candidates_is_all_cash() {
        let blobs = vec![RegionCandidates::new("US", "2024-06-07", vec![])];
        let p = optimize_portfolio(&blobs, None, &Constraints::default(), as_of()).unwrap();

        assert!(p.weights.is_empty());
        assert_relative_eq!(p.cash_weight, 1.0);
        assert_eq!(p.notes, NO_SELECTION);
    }

    #[test]
    fn test_synthetic_path_notes() {
        let candidates = (0..5).map(|i| Candidate::new(format!("US{i}"), "US", 0.5)).collect();
        let blobs = vec![RegionCandidates::new("US", "2024-06-07", candidates)];
        let constraints = Constraints::builder().region_limit("US", 0.5).build().unwrap();

        let p = optimize_portfolio(&blobs, None, &constraints, as_of()).unwrap();
        assert!(p.notes.starts_with("mean-variance (synthetic returns)"));
        assert!(!p.notes.contains("solver fallback"), "{}", p.notes);
        assert_relative_eq!(p.invested() + p.cash_weight, 1.0, epsilon = 1e-6);
        assert!(p.weights.iter().all(|w| w.weight <= 0.07 + 1e-6));
    }
}
