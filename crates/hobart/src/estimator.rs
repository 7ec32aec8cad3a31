//! Annualized expected returns and covariance for a selection.
//!
//! Historical estimates come from percentage returns of the price panel. When
//! the panel is missing or covers too few of the requested tickers, a seeded
//! synthetic return series stands in so the optimizer always has inputs.

use crate::error::Result;
use hobart_data::PricePanel;
use hobart_risk::{
    CovarianceEstimator, CovarianceMatrix, PairwiseCovariance, ReturnsMethod, TRADING_DAYS,
    compute_returns, ensure_positive_semidefinite, period_returns,
};
use ndarray::{Array2, Axis, Slice};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;

/// Share of requested tickers that must have prices.
pub const MIN_COVERAGE: f64 = 0.6;

/// Tickers that must have prices.
pub const MIN_AVAILABLE: usize = 2;

/// Eigenvalues above `-PSD_TOLERANCE` are left untouched.
const PSD_TOLERANCE: f64 = 1e-10;

/// Parameters of the synthetic return generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticReturns {
    /// RNG seed
    pub seed: u64,
    /// Simulated trading days
    pub days: usize,
    /// Daily mean return
    pub drift: f64,
    /// Daily return standard deviation
    pub volatility: f64,
}

impl Default for SyntheticReturns {
    fn default() -> Self {
        Self {
            seed: 0,
            days: 252,
            drift: 0.0003,
            volatility: 0.01,
        }
    }
}

impl SyntheticReturns {
    /// Simulate prices compounded from 100 and difference them back into
    /// `days - 1` rows of percentage returns.
    ///
    /// Each ticker draws its whole path before the next one starts, so adding
    /// tickers leaves the earlier paths unchanged.
    pub fn returns(&self, n_tickers: usize) -> Result<Array2<f64>> {
        let normal = Normal::new(self.drift, self.volatility)?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut prices = Array2::zeros((self.days, n_tickers));
        for mut path in prices.columns_mut() {
            let mut level = 100.0;
            for price in path.iter_mut() {
                level *= 1.0 + normal.sample(&mut rng);
                *price = level;
            }
        }

        let returns = period_returns(prices.view(), ReturnsMethod::Pct);
        Ok(returns.slice_axis(Axis(0), Slice::from(1..)).to_owned())
    }
}

/// Where an estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnsSource {
    /// Observed prices
    Historical,
    /// Seeded simulation
    Synthetic,
}

impl ReturnsSource {
    /// Label used in portfolio notes.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Historical => "historical returns",
            Self::Synthetic => "synthetic returns",
        }
    }
}

/// Optimizer inputs for a universe.
#[derive(Debug, Clone)]
pub struct Estimate {
    /// Tickers the estimate covers, in request order
    pub tickers: Vec<String>,
    /// Annualized mean returns; tickers without any return are absent
    pub expected_returns: BTreeMap<String, f64>,
    /// Annualized covariance, positive semidefinite
    pub covariance: CovarianceMatrix,
    /// Origin of the estimate
    pub source: ReturnsSource,
}

/// Returns estimator with a coverage-gated synthetic fallback.
#[derive(Debug, Clone, Copy)]
pub struct ReturnsEstimator {
    /// Minimum share of tickers with prices
    pub min_coverage: f64,
    /// Periods per year used to annualize
    pub periods_per_year: f64,
    /// Fallback generator
    pub synthetic: SyntheticReturns,
}

impl Default for ReturnsEstimator {
    fn default() -> Self {
        Self {
            min_coverage: MIN_COVERAGE,
            periods_per_year: TRADING_DAYS,
            synthetic: SyntheticReturns::default(),
        }
    }
}

impl ReturnsEstimator {
    /// Estimate annualized μ and Σ for `tickers`.
    ///
    /// A ticker counts as available when the panel has at least one finite
    /// price for it. With fewer than [`MIN_AVAILABLE`] available tickers, with
    /// coverage below `min_coverage`, or with no return periods, the synthetic
    /// generator is used over every requested ticker. Otherwise the estimate is
    /// restricted to the available tickers.
    pub fn estimate(&self, tickers: &[String], prices: Option<&PricePanel>) -> Result<Estimate> {
        let Some(panel) = prices.filter(|p| !p.is_empty()) else {
            tracing::info!(requested = tickers.len(), "no price panel; using synthetic returns");
            return self.synthetic_estimate(tickers);
        };

        let (available, missing): (Vec<String>, Vec<String>) = tickers
            .iter()
            .cloned()
            .partition(|t| panel.column(t).is_some_and(|c| c.iter().any(|v| v.is_finite())));

        let coverage = if tickers.is_empty() {
            0.0
        } else {
            available.len() as f64 / tickers.len() as f64
        };
        if available.len() < MIN_AVAILABLE || coverage < self.min_coverage {
            tracing::warn!(
                available = available.len(),
                requested = tickers.len(),
                coverage,
                ?missing,
                "insufficient price coverage; using synthetic returns"
            );
            return self.synthetic_estimate(tickers);
        }
        if !missing.is_empty() {
            tracing::info!(?missing, "dropping tickers without prices");
        }

        let returns = compute_returns(&panel.select(&available), ReturnsMethod::Pct);
        if returns.is_empty() {
            tracing::warn!(
                dates = panel.n_dates(),
                "price panel yields no return periods; using synthetic returns"
            );
            return self.synthetic_estimate(tickers);
        }

        self.annualize(available, returns.values(), ReturnsSource::Historical)
    }

    fn synthetic_estimate(&self, tickers: &[String]) -> Result<Estimate> {
        let returns = self.synthetic.returns(tickers.len())?;
        self.annualize(tickers.to_vec(), &returns, ReturnsSource::Synthetic)
    }

    fn annualize(
        &self,
        tickers: Vec<String>,
        returns: &Array2<f64>,
        source: ReturnsSource,
    ) -> Result<Estimate> {
        let expected_returns = tickers
            .iter()
            .zip(returns.axis_iter(Axis(1)))
            .filter_map(|(ticker, column)| {
                let observed: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
                (!observed.is_empty()).then(|| {
                    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
                    (ticker.clone(), mean * self.periods_per_year)
                })
            })
            .collect();

        let cov = PairwiseCovariance::default().covariance(returns) * self.periods_per_year;
        let cov = ensure_positive_semidefinite(&cov, PSD_TOLERANCE)?;

        Ok(Estimate {
            covariance: CovarianceMatrix::new(tickers.clone(), cov)?,
            tickers,
            expected_returns,
            source,
        })
    }
}
