//! Covariance estimation
//!
//! Sample covariance and correlation over returns with missing cells, a labelled
//! [`CovarianceMatrix`], and eigenvalue repair for matrices that came out of
//! pairwise estimation slightly indefinite.

pub mod pairwise;
pub mod utils;

pub use pairwise::PairwiseCovariance;
pub use utils::{EigenDecomposition, ensure_positive_semidefinite, min_eigenvalue, symmetric_eigen};

use crate::error::RiskError;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during covariance estimation
#[derive(Debug, Error)]
pub enum CovarianceError {
    /// Matrix is not square
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Eigen decomposition did not converge
    #[error("Eigen decomposition did not converge after {0} sweeps")]
    NotConverged(usize),
}

/// Estimator of a covariance matrix from a returns matrix (periods x assets).
pub trait CovarianceEstimator {
    /// Estimate the covariance matrix.
    fn covariance(&self, returns: &Array2<f64>) -> Array2<f64>;

    /// Estimate the correlation matrix.
    fn correlation(&self, returns: &Array2<f64>) -> Array2<f64>;
}

/// A covariance matrix indexed by ticker on both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    tickers: Vec<String>,
    values: Array2<f64>,
}

impl CovarianceMatrix {
    /// Label a square matrix.
    pub fn new(tickers: Vec<String>, values: Array2<f64>) -> Result<Self, RiskError> {
        if values.nrows() != tickers.len() || values.ncols() != tickers.len() {
            return Err(RiskError::ShapeMismatch {
                labels: tickers.len(),
                rows: values.nrows(),
                cols: values.ncols(),
            });
        }
        Ok(Self { tickers, values })
    }

    /// Axis labels.
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// The raw matrix.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Matrix dimension.
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    /// True for a 0x0 matrix.
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Entry for a pair of tickers.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Some(self.values[[i, j]])
    }

    fn index_of(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Sub-matrix in the order of `tickers`.
    pub fn reindex(&self, tickers: &[String]) -> Result<Self, RiskError> {
        let indices = tickers
            .iter()
            .map(|t| self.index_of(t).ok_or_else(|| RiskError::UnknownTicker(t.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tickers: tickers.to_vec(),
            values: self
                .values
                .select(Axis(0), &indices)
                .select(Axis(1), &indices),
        })
    }

    /// Every entry multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            tickers: self.tickers.clone(),
            values: &self.values * factor,
        }
    }

    /// Nested `{ticker: {ticker: value}}` map.
    pub fn to_nested_map(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.tickers
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let inner = self
                    .tickers
                    .iter()
                    .enumerate()
                    .map(|(j, col)| (col.clone(), self.values[[i, j]]))
                    .collect();
                (row.clone(), inner)
            })
            .collect()
    }
}

/// Serialized as the nested map.
impl Serialize for CovarianceMatrix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_nested_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CovarianceMatrix {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let nested = BTreeMap::<String, BTreeMap<String, f64>>::deserialize(deserializer)?;
        let tickers: Vec<String> = nested.keys().cloned().collect();
        let mut values = Array2::zeros((tickers.len(), tickers.len()));
        for (i, row) in tickers.iter().enumerate() {
            for (j, col) in tickers.iter().enumerate() {
                values[[i, j]] = nested
                    .get(row)
                    .and_then(|r| r.get(col))
                    .copied()
                    .ok_or_else(|| serde::de::Error::custom(format!("missing entry {row}/{col}")))?;
            }
        }
        Ok(Self { tickers, values })
    }
}
