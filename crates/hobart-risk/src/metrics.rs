//! Per-ticker risk metrics.

use crate::{
    covariance::{CovarianceEstimator, CovarianceMatrix, PairwiseCovariance},
    returns::ReturnsPanel,
};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Risk metrics keyed by ticker.
///
/// An empty value serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Annualized covariance
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub covariance: BTreeMap<String, BTreeMap<String, f64>>,
    /// Correlation, unit diagonal, entries in [-1, 1]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub correlation: BTreeMap<String, BTreeMap<String, f64>>,
    /// Annualized volatility, non-negative
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volatility: BTreeMap<String, f64>,
    /// Maximum drawdown, in [-1, 0]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub max_drawdown: BTreeMap<String, f64>,
}

impl RiskMetrics {
    /// True when nothing was computed.
    pub fn is_empty(&self) -> bool {
        self.covariance.is_empty()
            && self.correlation.is_empty()
            && self.volatility.is_empty()
            && self.max_drawdown.is_empty()
    }

    /// Compute metrics for a returns panel, annualizing with `periods_per_year`.
    pub fn from_returns(returns: &ReturnsPanel, periods_per_year: f64) -> Self {
        if returns.is_empty() {
            return Self::default();
        }

        let estimator = PairwiseCovariance::default();
        let values = returns.values();
        let tickers = returns.tickers().to_vec();

        let covariance = CovarianceMatrix::new(tickers.clone(), estimator.covariance(values))
            .map(|cov| cov.scaled(periods_per_year).to_nested_map())
            .unwrap_or_default();
        let correlation = CovarianceMatrix::new(tickers.clone(), estimator.correlation(values))
            .map(|corr| corr.to_nested_map())
            .unwrap_or_default();

        let scale = periods_per_year.sqrt();
        let volatility = tickers
            .iter()
            .cloned()
            .zip(estimator.std_devs(values))
            .map(|(ticker, sd)| (ticker, sd * scale))
            .collect();

        let max_drawdown = tickers
            .iter()
            .cloned()
            .zip(values.columns())
            .map(|(ticker, column)| (ticker, max_drawdown(column)))
            .collect();

        Self {
            covariance,
            correlation,
            volatility,
            max_drawdown,
        }
    }
}

/// Maximum drawdown of the compounded path of `returns`.
///
/// Missing returns count as zero. The result is the minimum of
/// `cum / running_max - 1`, so it lies in [-1, 0].
pub fn max_drawdown(returns: ArrayView1<'_, f64>) -> f64 {
    let mut cumulative = 1.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;

    for r in returns {
        let r = if r.is_finite() { *r } else { 0.0 };
        cumulative *= 1.0 + r;
        peak = peak.max(cumulative);
        if peak > 0.0 {
            worst = worst.min(cumulative / peak - 1.0);
        }
    }

    worst.clamp(-1.0, 0.0)
}
