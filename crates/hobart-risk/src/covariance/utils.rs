//! Eigen decomposition and positive semidefinite repair.

use super::CovarianceError;
use ndarray::{Array1, Array2};

/// Result of eigenvalue decomposition
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    /// Eigenvalues (sorted in descending order)
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors (columns are eigenvectors)
    pub eigenvectors: Array2<f64>,
}

impl EigenDecomposition {
    /// Rebuild `V diag(λ) Vᵀ` from possibly modified eigenvalues.
    pub fn reconstruct(&self, eigenvalues: &Array1<f64>) -> Array2<f64> {
        let scaled = &self.eigenvectors * eigenvalues;
        let mut out = scaled.dot(&self.eigenvectors.t());
        symmetrize(&mut out);
        out
    }
}

/// Cyclic Jacobi eigen decomposition of a symmetric matrix.
///
/// Sweeps until the off-diagonal Frobenius norm falls below `tolerance` times the
/// matrix norm.
pub fn symmetric_eigen(
    matrix: &Array2<f64>,
    max_sweeps: usize,
    tolerance: f64,
) -> Result<EigenDecomposition, CovarianceError> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(CovarianceError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }

    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);
    let norm = a.iter().map(|x| x * x).sum::<f64>().sqrt();

    for _ in 0..max_sweeps {
        let off = off_diagonal_norm(&a);
        if off <= tolerance * norm || norm == 0.0 {
            return Ok(sorted(a, v));
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    if off_diagonal_norm(&a) <= tolerance * norm {
        Ok(sorted(a, v))
    } else {
        Err(CovarianceError::NotConverged(max_sweeps))
    }
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    let mut sum = 0.0;
    for ((i, j), x) in a.indexed_iter() {
        if i != j {
            sum += x * x;
        }
    }
    sum.sqrt()
}

fn sorted(a: Array2<f64>, v: Array2<f64>) -> EigenDecomposition {
    let n = a.nrows();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));

    let eigenvalues = order.iter().map(|&i| a[[i, i]]).collect();
    let eigenvectors = v.select(ndarray::Axis(1), &order);
    EigenDecomposition {
        eigenvalues,
        eigenvectors,
    }
}

fn symmetrize(m: &mut Array2<f64>) {
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (m[[i, j]] + m[[j, i]]);
            m[[i, j]] = avg;
            m[[j, i]] = avg;
        }
    }
}

/// Smallest eigenvalue of a symmetric matrix.
pub fn min_eigenvalue(matrix: &Array2<f64>) -> Result<f64, CovarianceError> {
    let decomp = symmetric_eigen(matrix, 100, 1e-12)?;
    Ok(decomp.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Return `cov` unchanged when it is positive semidefinite up to `tolerance`,
/// otherwise clip negative eigenvalues to zero and rebuild it.
pub fn ensure_positive_semidefinite(
    cov: &Array2<f64>,
    tolerance: f64,
) -> Result<Array2<f64>, CovarianceError> {
    if cov.is_empty() {
        return Ok(cov.clone());
    }

    let decomp = symmetric_eigen(cov, 100, 1e-12)?;
    let smallest = decomp.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    if smallest >= -tolerance {
        return Ok(cov.clone());
    }

    tracing::debug!(smallest, "clipping negative eigenvalues of covariance");
    let clipped = decomp.eigenvalues.mapv(|v| v.max(0.0));
    Ok(decomp.reconstruct(&clipped))
}
