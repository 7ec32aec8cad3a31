//! Sample covariance over pairwise-complete observations.

use super::CovarianceEstimator;
use ndarray::{Array2, ArrayView1};

/// Sample estimator that tolerates missing cells.
///
/// Each pair of columns uses only the periods where both are observed, with means
/// taken over those periods and an `n - 1` denominator. A pair with fewer than
/// `min_periods` shared observations gets covariance 0 and correlation 0.
#[derive(Debug, Clone, Copy)]
pub struct PairwiseCovariance {
    /// Minimum shared observations for a defined entry
    pub min_periods: usize,
}

impl Default for PairwiseCovariance {
    fn default() -> Self {
        Self { min_periods: 2 }
    }
}

/// Moments of one column pair over its shared observations.
struct PairMoments {
    n: usize,
    cov: f64,
    var_a: f64,
    var_b: f64,
}

impl PairwiseCovariance {
    /// Create an estimator requiring `min_periods` shared observations (at least 2).
    pub const fn new(min_periods: usize) -> Self {
        Self {
            min_periods: if min_periods < 2 { 2 } else { min_periods },
        }
    }

    fn moments(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> PairMoments {
        let pairs: Vec<(f64, f64)> = a
            .iter()
            .zip(b.iter())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (*x, *y))
            .collect();

        let n = pairs.len();
        if n < 2 {
            return PairMoments {
                n,
                cov: 0.0,
                var_a: 0.0,
                var_b: 0.0,
            };
        }

        let nf = n as f64;
        let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / nf;
        let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / nf;

        let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
        for (x, y) in &pairs {
            let dx = x - mean_a;
            let dy = y - mean_b;
            cov += dx * dy;
            var_a += dx * dx;
            var_b += dy * dy;
        }

        let denom = nf - 1.0;
        PairMoments {
            n,
            cov: cov / denom,
            var_a: var_a / denom,
            var_b: var_b / denom,
        }
    }

    /// Sample standard deviation of each column over its observed cells.
    pub fn std_devs(&self, returns: &Array2<f64>) -> Vec<f64> {
        returns
            .columns()
            .into_iter()
            .map(|col| {
                let m = Self::moments(col, col);
                if m.n >= self.min_periods { m.var_a.max(0.0).sqrt() } else { 0.0 }
            })
            .collect()
    }
}

impl CovarianceEstimator for PairwiseCovariance {
    fn covariance(&self, returns: &Array2<f64>) -> Array2<f64> {
        let n = returns.ncols();
        let mut cov = Array2::zeros((n, n));

        for i in 0..n {
            for j in i..n {
                let m = Self::moments(returns.column(i), returns.column(j));
                let value = if m.n >= self.min_periods { m.cov } else { 0.0 };
                cov[[i, j]] = value;
                cov[[j, i]] = value;
            }
        }

        cov
    }

    fn correlation(&self, returns: &Array2<f64>) -> Array2<f64> {
        let n = returns.ncols();
        let mut corr = Array2::eye(n);

        for i in 0..n {
            for j in (i + 1)..n {
                let m = Self::moments(returns.column(i), returns.column(j));
                let denom = (m.var_a * m.var_b).sqrt();
                let value = if m.n >= self.min_periods && denom > 0.0 {
                    (m.cov / denom).clamp(-1.0, 1.0)
                } else {
                    0.0
                };
                corr[[i, j]] = value;
                corr[[j, i]] = value;
            }
        }

        corr
    }
}
