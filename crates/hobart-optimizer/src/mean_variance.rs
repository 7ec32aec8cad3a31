//! Constrained mean-variance optimization.

use crate::{
    constraints::Constraints,
    error::OptimizerError,
    feasible::FeasibleSet,
    objective::Objective,
    solver::{AugmentedLagrangian, Problem, SolverSettings},
};
use hobart_risk::CovarianceMatrix;
use ndarray::Array1;
use std::collections::BTreeMap;

/// Violation above which a solver result is discarded.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-7;

/// Slack on the upper budget before weights are scaled down.
pub const BUDGET_EPSILON: f64 = 1e-9;

/// How the weights were obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    /// The solver converged to a feasible point
    Converged {
        /// Projected gradient iterations used
        iterations: usize,
    },
    /// The iteration budget ran out on a feasible iterate no worse than the
    /// initial guess, which was kept
    IterationLimit {
        /// Projected gradient iterations used
        iterations: usize,
    },
    /// The initial guess was returned
    Fallback {
        /// Largest constraint violation of the rejected solver iterate
        violation: f64,
    },
}

impl SolveStatus {
    /// True when the initial guess was returned.
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Weights plus how they were obtained.
#[derive(Debug, Clone)]
pub struct MeanVarianceSolution {
    /// Weights, parallel to the input tickers
    pub weights: Array1<f64>,
    /// Solver status
    pub status: SolveStatus,
}

/// Constrained mean-variance optimizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanVarianceOptimizer {
    settings: SolverSettings,
}

impl MeanVarianceOptimizer {
    /// Create an optimizer with custom solver settings.
    pub const fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Optimize weights for `tickers`.
    ///
    /// # Arguments
    /// * `tickers` - Assets, at least one
    /// * `regions` - Region of each asset, parallel to `tickers`
    /// * `mu` - Expected annual returns; tickers missing from the map count as 0
    /// * `cov` - Annualized covariance containing every ticker
    /// * `constraints` - Validated constraints
    ///
    /// When the solver does not reach a feasible stationary point the starting
    /// guess `min(position_limit, 1/n)` is returned unchanged, before the final
    /// budget clip.
    pub fn optimize(
        &self,
        tickers: &[String],
        regions: &[String],
        mu: Option<&BTreeMap<String, f64>>,
        cov: &CovarianceMatrix,
        constraints: &Constraints,
    ) -> Result<MeanVarianceSolution, OptimizerError> {
        let n = tickers.len();
        if n == 0 {
            return Err(OptimizerError::EmptyUniverse);
        }
        if regions.len() != n {
            return Err(OptimizerError::LengthMismatch {
                tickers: n,
                regions: regions.len(),
            });
        }

        let cov = cov.reindex(tickers)?;
        if cov.values().iter().any(|v| !v.is_finite()) {
            return Err(OptimizerError::NonFiniteCovariance);
        }

        let mu_vec: Array1<f64> = tickers
            .iter()
            .map(|t| {
                mu.and_then(|m| m.get(t))
                    .copied()
                    .filter(|v| v.is_finite())
                    .unwrap_or(0.0)
            })
            .collect();

        let feasible = FeasibleSet::new(regions, constraints);
        let problem = Problem {
            cov: cov.values(),
            mu: &mu_vec,
            objective: Objective::for_constraints(constraints, mu.is_some()),
            variance_cap: constraints.target_vol().map(|vol| vol * vol),
            feasible: &feasible,
        };

        let x0 = Array1::from_elem(n, constraints.position_limit().min(1.0 / n as f64));
        let outcome = AugmentedLagrangian::new(self.settings).solve(&problem, &x0);
        let violation = problem.max_violation(&outcome.x);

        let improves = problem.objective_value(&outcome.x) <= problem.objective_value(&x0);

        let (mut weights, status) = if violation <= FEASIBILITY_TOLERANCE && outcome.converged {
            tracing::debug!(
                iterations = outcome.iterations,
                objective = ?problem.objective,
                "mean-variance solve converged"
            );
            (
                outcome.x,
                SolveStatus::Converged {
                    iterations: outcome.iterations,
                },
            )
        } else if violation <= FEASIBILITY_TOLERANCE && improves {
            tracing::warn!(
                iterations = outcome.iterations,
                "optimizer hit its iteration limit; keeping the feasible iterate"
            );
            (
                outcome.x,
                SolveStatus::IterationLimit {
                    iterations: outcome.iterations,
                },
            )
        } else {
            tracing::warn!(
                converged = outcome.converged,
                violation,
                "optimizer did not reach a feasible optimum; using initial guess"
            );
            (x0, SolveStatus::Fallback { violation })
        };

        let total = weights.sum();
        let invest_max = constraints.invest_max();
        if total > invest_max + BUDGET_EPSILON {
            weights *= invest_max / total;
        }

        Ok(MeanVarianceSolution { weights, status })
    }
}

/// Optimize with default solver settings and return only the weights.
///
/// See [`MeanVarianceOptimizer::optimize`].
pub fn optimize_mean_variance(
    tickers: &[String],
    regions: &[String],
    mu: Option<&BTreeMap<String, f64>>,
    cov: &CovarianceMatrix,
    constraints: &Constraints,
) -> Result<Array1<f64>, OptimizerError> {
    MeanVarianceOptimizer::default()
        .optimize(tickers, regions, mu, cov, constraints)
        .map(|solution| solution.weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Target;
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rejects_empty_and_mismatched_inputs() {
        let cov = CovarianceMatrix::new(names(&["A"]), array![[0.04]]).unwrap();
        let c = Constraints::default();

        assert!(matches!(
            optimize_mean_variance(&[], &[], None, &cov, &c),
            Err(OptimizerError::EmptyUniverse)
        ));
        assert!(matches!(
            optimize_mean_variance(&names(&["A"]), &[], None, &cov, &c),
            Err(OptimizerError::LengthMismatch { .. })
        ));
        assert!(matches!(
            optimize_mean_variance(&names(&["B"]), &names(&["US"]), None, &cov, &c),
            Err(OptimizerError::Risk(_))
        ));
    }

    #[test]
    fn test_missing_mu_entries_count_as_zero() {
        let tickers = names(&["A", "B"]);
        let cov = CovarianceMatrix::new(tickers.clone(), Array2::eye(2) * 0.04).unwrap();
        let c = Constraints::builder()
            .position_limit(1.0)
            .cash_bounds(0.0, 0.0)
            .target(Target::MaxReturn)
            .build()
            .unwrap();
        let mu = BTreeMap::from([("B".to_string(), 0.1)]);

        let w = optimize_mean_variance(&tickers, &names(&["US", "US"]), Some(&mu), &cov, &c).unwrap();
        assert_relative_eq!(w[0], 0.0, epsilon = 1e-8);
        assert_relative_eq!(w[1], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_infeasible_variance_cap_falls_back_to_initial_guess() {
        // fully invested in two assets with variance 0.09 cannot reach vol 0.05
        let tickers = names(&["A", "B"]);
        let cov = CovarianceMatrix::new(tickers.clone(), Array2::eye(2) * 0.09).unwrap();
        let c = Constraints::builder()
            .position_limit(1.0)
            .cash_bounds(0.0, 0.0)
            .target_vol(Some(0.05))
            .build()
            .unwrap();

        let solution = MeanVarianceOptimizer::default()
            .optimize(&tickers, &names(&["US", "JP"]), None, &cov, &c)
            .unwrap();
        assert!(solution.status.is_fallback());
        assert_eq!(solution.weights, array![0.5, 0.5]);
    }

    #[test]
    fn test_initial_guess_is_capped_by_position_limit() {
        // three assets at 0.07 never exceed invest_max, so the fallback stays as is
        let tickers = names(&["A", "B", "C"]);
        let cov = CovarianceMatrix::new(tickers.clone(), Array2::eye(3) * 0.09).unwrap();
        let c = Constraints::builder()
            .position_limit(0.07)
            .cash_bounds(0.0, 0.1)
            .target_vol(Some(0.001))
            .build()
            .unwrap();

        let solution = MeanVarianceOptimizer::default()
            .optimize(&tickers, &names(&["US", "US", "US"]), None, &cov, &c)
            .unwrap();
        assert!(solution.status.is_fallback());
        assert_eq!(solution.weights, array![0.07, 0.07, 0.07]);
    }

    #[test]
    fn test_iteration_limit_keeps_improving_iterate() {
        let tickers: Vec<String> = (0..6).map(|i| format!("T{i}")).collect();
        let regions = vec!["US".to_string(); 6];
        let cov = Array2::from_shape_fn((6, 6), |(i, j)| {
            if i == j { 0.04 + 0.01 * i as f64 } else { 0.012 }
        });
        let cov = CovarianceMatrix::new(tickers.clone(), cov).unwrap();
        let c = Constraints::builder()
            .position_limit(0.3)
            .cash_bounds(0.0, 0.2)
            .build()
            .unwrap();
        let settings = SolverSettings {
            max_inner_iterations: 1,
            ..SolverSettings::default()
        };

        let solution = MeanVarianceOptimizer::new(settings)
            .optimize(&tickers, &regions, None, &cov, &c)
            .unwrap();
        assert!(matches!(solution.status, SolveStatus::IterationLimit { iterations: 1 }));
        assert!(!solution.status.is_fallback());

        let x0 = Array1::from_elem(6, 1.0 / 6.0);
        let variance = |w: &Array1<f64>| w.dot(&cov.values().dot(w));
        assert!(variance(&solution.weights) < variance(&x0));
        assert!(solution.weights.sum() >= 0.8 - 1e-9);
    }
}
