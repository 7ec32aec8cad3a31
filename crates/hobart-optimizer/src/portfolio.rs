//! The published portfolio.

use crate::constraints::Constraints;
use chrono::NaiveDate;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weights at or below this are dropped.
pub const MIN_WEIGHT: f64 = 1e-6;

const DECIMALS: f64 = 1e6;

fn round6(x: f64) -> f64 {
    (x * DECIMALS).round() / DECIMALS
}

/// One holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioWeight {
    /// Ticker
    pub ticker: String,
    /// Region code
    pub region: String,
    /// Weight, rounded to 6 decimals and strictly positive
    pub weight: f64,
}

/// Weekly portfolio: holdings plus cash summing to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Rebalance date
    pub as_of: NaiveDate,
    /// Holdings in selection order
    pub weights: Vec<PortfolioWeight>,
    /// Uninvested share
    pub cash_weight: f64,
    /// Region caps in force
    pub region_limits: BTreeMap<String, f64>,
    /// Position cap in force
    pub position_limit: f64,
    /// How the weights were produced
    pub notes: String,
}

impl Portfolio {
    /// A portfolio holding only cash.
    pub fn all_cash(as_of: NaiveDate, constraints: &Constraints, notes: impl Into<String>) -> Self {
        Self {
            as_of,
            weights: Vec::new(),
            cash_weight: 1.0,
            region_limits: constraints.region_limits().clone(),
            position_limit: constraints.position_limit(),
            notes: notes.into(),
        }
    }

    /// Assemble a portfolio from optimizer weights.
    ///
    /// Weights at or below [`MIN_WEIGHT`] are dropped, the rest are rounded to six
    /// decimals and cash takes the remainder.
    pub fn from_weights(
        as_of: NaiveDate,
        tickers: &[String],
        regions: &[String],
        weights: &Array1<f64>,
        constraints: &Constraints,
        notes: impl Into<String>,
    ) -> Self {
        let mut holdings: Vec<PortfolioWeight> = tickers
            .iter()
            .zip(regions)
            .zip(weights.iter())
            .filter(|(_, w)| **w > MIN_WEIGHT)
            .map(|((ticker, region), w)| PortfolioWeight {
                ticker: ticker.clone(),
                region: region.clone(),
                weight: round6(*w),
            })
            .collect();

        // rounding can push the total a hair above one
        let invested: f64 = holdings.iter().map(|h| h.weight).sum();
        if invested > 1.0
            && let Some(largest) = holdings
                .iter_mut()
                .max_by(|a, b| a.weight.total_cmp(&b.weight))
        {
            largest.weight = round6(largest.weight - (invested - 1.0));
        }

        let invested: f64 = holdings.iter().map(|h| h.weight).sum();
        Self {
            as_of,
            weights: holdings,
            cash_weight: round6((1.0 - invested).max(0.0)),
            region_limits: constraints.region_limits().clone(),
            position_limit: constraints.position_limit(),
            notes: notes.into(),
        }
    }

    /// Sum of holding weights.
    pub fn invested(&self) -> f64 {
        self.weights.iter().map(|w| w.weight).sum()
    }

    /// Total weight per region.
    pub fn region_exposure(&self) -> BTreeMap<String, f64> {
        let mut exposure = BTreeMap::new();
        for holding in &self.weights {
            *exposure.entry(holding.region.clone()).or_insert(0.0) += holding.weight;
        }
        exposure
    }

    /// Whether the portfolio holds nothing but cash.
    pub fn is_all_cash(&self) -> bool {
        self.weights.is_empty()
    }
}
