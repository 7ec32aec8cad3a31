//! Augmented Lagrangian solver over the linear feasible set.
//!
//! Linear constraints are enforced exactly by projection. The optional variance cap
//! `wᵀΣw ≤ τ²` is moved into the objective with the Powell–Hestenes–Rockafellar
//! augmented Lagrangian; each subproblem is solved by projected gradient descent
//! with backtracking.

use crate::{feasible::FeasibleSet, objective::Objective};
use ndarray::{Array1, Array2};

const MAX_STEP: f64 = 1e6;
const MIN_STEP: f64 = 1e-20;

/// Solver settings
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    /// Outer (multiplier update) iterations
    pub max_outer_iterations: usize,
    /// Projected gradient iterations per subproblem
    pub max_inner_iterations: usize,
    /// Stop a subproblem when `‖x − P(x − ∇F)‖∞ ≤ tol · max(1, ‖∇F‖∞)`
    pub stationarity_tolerance: f64,
    /// Accepted violation of the variance cap
    pub feasibility_tolerance: f64,
    /// Initial penalty parameter
    pub initial_penalty: f64,
    /// Penalty growth factor when the violation stalls
    pub penalty_growth: f64,
    /// Upper bound on the penalty parameter
    pub max_penalty: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_outer_iterations: 50,
            max_inner_iterations: 5_000,
            stationarity_tolerance: 1e-10,
            feasibility_tolerance: 1e-9,
            initial_penalty: 10.0,
            penalty_growth: 10.0,
            max_penalty: 1e12,
        }
    }
}

/// A mean-variance problem in matrix form.
#[derive(Debug, Clone, Copy)]
pub struct Problem<'a> {
    /// Covariance matrix
    pub cov: &'a Array2<f64>,
    /// Expected returns (zeros when absent)
    pub mu: &'a Array1<f64>,
    /// Objective
    pub objective: Objective,
    /// Upper bound on `wᵀΣw`
    pub variance_cap: Option<f64>,
    /// Linear constraints
    pub feasible: &'a FeasibleSet,
}

impl Problem<'_> {
    /// Portfolio variance.
    pub fn variance(&self, w: &Array1<f64>) -> f64 {
        w.dot(&self.cov.dot(w))
    }

    /// Objective value, without the variance cap.
    pub fn objective_value(&self, w: &Array1<f64>) -> f64 {
        let sigma_w = self.cov.dot(w);
        let variance = w.dot(&sigma_w);
        self.objective.evaluate(w, &sigma_w, variance, self.mu).0
    }

    /// Largest violation across linear constraints and the variance cap.
    pub fn max_violation(&self, w: &Array1<f64>) -> f64 {
        let linear = self.feasible.max_violation(w);
        match self.variance_cap {
            Some(cap) => linear.max(self.variance(w) - cap),
            None => linear,
        }
    }
}

/// Outcome of a solve.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Final iterate
    pub x: Array1<f64>,
    /// Whether stationarity and feasibility tolerances were met
    pub converged: bool,
    /// Total projected gradient iterations
    pub iterations: usize,
}

/// PHR augmented Lagrangian with projected gradient subproblems.
#[derive(Debug, Clone, Copy, Default)]
pub struct AugmentedLagrangian {
    settings: SolverSettings,
}

/// Objective plus the augmented term for the variance cap.
struct Merit<'a> {
    problem: &'a Problem<'a>,
    multiplier: f64,
    penalty: f64,
}

impl Merit<'_> {
    fn eval(&self, w: &Array1<f64>) -> (f64, Array1<f64>) {
        let sigma_w = self.problem.cov.dot(w);
        let variance = w.dot(&sigma_w);
        let (mut value, mut grad) =
            self.problem
                .objective
                .evaluate(w, &sigma_w, variance, self.problem.mu);

        if let Some(cap) = self.problem.variance_cap {
            let shifted = (self.multiplier + self.penalty * (variance - cap)).max(0.0);
            value += (shifted * shifted - self.multiplier * self.multiplier) / (2.0 * self.penalty);
            grad.scaled_add(2.0 * shifted, &sigma_w);
        }

        (value, grad)
    }
}

impl AugmentedLagrangian {
    /// Create a solver with `settings`.
    pub const fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Minimize `problem` starting from the projection of `x0`.
    pub fn solve(&self, problem: &Problem<'_>, x0: &Array1<f64>) -> SolveOutcome {
        let s = &self.settings;
        let mut x = problem.feasible.project(x0);
        let mut step = 1.0;

        let Some(cap) = problem.variance_cap else {
            let merit = Merit {
                problem,
                multiplier: 0.0,
                penalty: 1.0,
            };
            let (x, converged, iterations) = self.minimize(&merit, x, &mut step);
            return SolveOutcome {
                x,
                converged,
                iterations,
            };
        };

        let mut multiplier = 0.0;
        let mut penalty = s.initial_penalty;
        let mut previous_residual = f64::INFINITY;
        let mut iterations = 0;

        for _ in 0..s.max_outer_iterations {
            let merit = Merit {
                problem,
                multiplier,
                penalty,
            };
            let (next, inner_converged, inner_iterations) = self.minimize(&merit, x, &mut step);
            iterations += inner_iterations;
            x = next;

            let g = problem.variance(&x) - cap;
            // complementarity residual |max(g, -λ/ρ)|
            let residual = g.max(-multiplier / penalty).abs();
            multiplier = (multiplier + penalty * g).max(0.0);

            if inner_converged && residual <= s.feasibility_tolerance {
                return SolveOutcome {
                    x,
                    converged: true,
                    iterations,
                };
            }

            if residual > 0.25 * previous_residual {
                penalty = (penalty * s.penalty_growth).min(s.max_penalty);
            }
            previous_residual = residual;
        }

        let converged = problem.max_violation(&x) <= s.feasibility_tolerance;
        SolveOutcome {
            x,
            converged,
            iterations,
        }
    }

    /// Projected gradient with backtracking on the sufficient decrease condition
    /// `F(x⁺) ≤ F(x) + ∇F·d + ‖d‖²/(2t)`.
    ///
    /// Stationarity is measured at a unit step so the adaptive step length does
    /// not inflate the residual near the optimum.
    fn minimize(&self, merit: &Merit<'_>, mut x: Array1<f64>, step: &mut f64) -> (Array1<f64>, bool, usize) {
        let feasible = merit.problem.feasible;
        let (mut value, mut grad) = merit.eval(&x);

        for iteration in 0..self.settings.max_inner_iterations {
            if self.is_stationary(feasible, &x, &grad) {
                return (x, true, iteration);
            }

            let mut t = *step;
            let accepted = loop {
                let trial = feasible.project(&(&x - &(&grad * t)));
                let d = &trial - &x;
                let d_norm2 = d.dot(&d);
                if d_norm2 == 0.0 {
                    return (x, true, iteration);
                }

                let (trial_value, trial_grad) = merit.eval(&trial);
                let bound = value + grad.dot(&d) + d_norm2 / (2.0 * t);
                if trial_value <= bound + 1e-15 * value.abs() {
                    break Some((trial, trial_value, trial_grad));
                }

                t *= 0.5;
                if t < MIN_STEP {
                    break None;
                }
            };

            let Some((trial, trial_value, trial_grad)) = accepted else {
                // no decrease at machine precision
                return (x, true, iteration);
            };
            if trial_value >= value {
                // merit values no longer resolve the remaining steps
                return (x, true, iteration);
            }

            x = trial;
            value = trial_value;
            grad = trial_grad;
            *step = (t * 2.0).min(MAX_STEP);
        }

        let converged = self.is_stationary(feasible, &x, &grad);
        (x, converged, self.settings.max_inner_iterations)
    }

    fn is_stationary(&self, feasible: &FeasibleSet, x: &Array1<f64>, grad: &Array1<f64>) -> bool {
        stationarity_residual(feasible, x, grad)
            <= self.settings.stationarity_tolerance * max_abs(grad).max(1.0)
    }
}

/// `‖x − P(x − ∇F)‖∞`, zero exactly at a stationary point of the constrained problem.
pub fn stationarity_residual(feasible: &FeasibleSet, x: &Array1<f64>, grad: &Array1<f64>) -> f64 {
    let unit = feasible.project(&(x - grad));
    max_abs(&(&unit - x))
}

fn max_abs(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0, |acc: f64, x| acc.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraints;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_min_variance_two_uncorrelated_assets() {
        // w ∝ 1/σ² for the fully invested minimum variance portfolio
        let cov = array![[0.04, 0.0], [0.0, 0.16]];
        let mu = Array1::zeros(2);
        let constraints = Constraints::builder()
            .position_limit(1.0)
            .cash_bounds(0.0, 0.0)
            .build()
            .unwrap();
        let feasible = FeasibleSet::new(&["US".into(), "US".into()], &constraints);
        let problem = Problem {
            cov: &cov,
            mu: &mu,
            objective: Objective::MinVariance,
            variance_cap: None,
            feasible: &feasible,
        };

        let out = AugmentedLagrangian::default().solve(&problem, &array![0.5, 0.5]);
        assert!(out.converged);
        assert_relative_eq!(out.x[0], 0.8, epsilon = 1e-6);
        assert_relative_eq!(out.x[1], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_variance_cap_binds() {
        let cov = array![[0.09, 0.0], [0.0, 0.09]];
        let mu = array![0.15, 0.12];
        let constraints = Constraints::builder()
            .position_limit(1.0)
            .cash_bounds(0.0, 0.0)
            .build()
            .unwrap();
        let feasible = FeasibleSet::new(&["US".into(), "US".into()], &constraints);
        let problem = Problem {
            cov: &cov,
            mu: &mu,
            objective: Objective::RiskAdjustedReturn { risk_aversion: 5.0 },
            variance_cap: Some(0.22 * 0.22),
            feasible: &feasible,
        };

        let out = AugmentedLagrangian::default().solve(&problem, &array![0.5, 0.5]);
        assert!(out.converged);
        assert!(problem.variance(&out.x) <= 0.22 * 0.22 + 1e-8);
        // cap active: a² + (1 − a)² = 0.0484 / 0.09
        let a = 0.5 * (1.0 + (1.0_f64 - 4.0 * (1.0 - 0.0484 / 0.09) / 2.0).sqrt());
        assert_relative_eq!(out.x[0], a, epsilon = 1e-5);
    }

    #[test]
    fn test_max_return_reaches_vertex() {
        let cov = Array2::eye(3) * 0.04;
        let mu = array![0.05, 0.10, 0.07];
        let constraints = Constraints::builder()
            .position_limit(0.5)
            .cash_bounds(0.0, 0.0)
            .build()
            .unwrap();
        let feasible = FeasibleSet::new(&["US".into(), "JP".into(), "EU".into()], &constraints);
        let problem = Problem {
            cov: &cov,
            mu: &mu,
            objective: Objective::MaxReturn,
            variance_cap: None,
            feasible: &feasible,
        };

        let out = AugmentedLagrangian::default().solve(&problem, &array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
        assert!(out.converged);
        assert_relative_eq!(out.x[0], 0.0, epsilon = 1e-8);
        assert_relative_eq!(out.x[1], 0.5, epsilon = 1e-8);
        assert_relative_eq!(out.x[2], 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_dense_min_variance_reaches_stationarity() {
        let n = 8;
        let cov = Array2::from_shape_fn((n, n), |(i, j)| {
            let common = 0.02 * (0.7 + 0.1 * i as f64) * (0.7 + 0.1 * j as f64);
            if i == j { common + 0.015 } else { common }
        });
        let mu = Array1::zeros(n);
        let constraints = Constraints::builder()
            .position_limit(0.2)
            .cash_bounds(0.0, 0.1)
            .build()
            .unwrap();
        let feasible = FeasibleSet::new(&vec!["US".to_string(); n], &constraints);
        let problem = Problem {
            cov: &cov,
            mu: &mu,
            objective: Objective::MinVariance,
            variance_cap: None,
            feasible: &feasible,
        };

        let x0 = Array1::from_elem(n, 1.0 / n as f64);
        let out = AugmentedLagrangian::default().solve(&problem, &x0);
        assert!(out.converged);
        assert!(out.iterations < SolverSettings::default().max_inner_iterations);
        assert!(problem.objective_value(&out.x) < problem.objective_value(&x0));

        let grad = cov.dot(&out.x) * 2.0;
        assert!(stationarity_residual(&feasible, &out.x, &grad) < 1e-8);
    }
}
