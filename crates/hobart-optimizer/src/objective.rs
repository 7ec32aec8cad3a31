//! Objective functions.

use crate::constraints::{Constraints, Target};
use ndarray::Array1;

/// What the optimizer minimizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// `wᵀΣw`
    MinVariance,
    /// `wᵀΣw − a·μᵀw`
    RiskAdjustedReturn {
        /// Weight `a` on expected return
        risk_aversion: f64,
    },
    /// `−μᵀw`
    MaxReturn,
}

impl Objective {
    /// Pick the objective for `constraints`.
    ///
    /// The trade-off applies when risk aversion is positive and expected returns were
    /// supplied; otherwise return is maximized for [`Target::MaxReturn`] with expected
    /// returns; otherwise variance is minimized.
    pub fn for_constraints(constraints: &Constraints, has_expected_returns: bool) -> Self {
        if has_expected_returns && constraints.risk_aversion() > 0.0 {
            Self::RiskAdjustedReturn {
                risk_aversion: constraints.risk_aversion(),
            }
        } else if has_expected_returns && constraints.target() == Target::MaxReturn {
            Self::MaxReturn
        } else {
            Self::MinVariance
        }
    }

    /// Value and gradient at `w`, given `Σw` and `wᵀΣw`.
    pub fn evaluate(
        &self,
        w: &Array1<f64>,
        sigma_w: &Array1<f64>,
        variance: f64,
        mu: &Array1<f64>,
    ) -> (f64, Array1<f64>) {
        match *self {
            Self::MinVariance => (variance, sigma_w * 2.0),
            Self::RiskAdjustedReturn { risk_aversion } => (
                variance - risk_aversion * mu.dot(w),
                sigma_w * 2.0 - mu * risk_aversion,
            ),
            Self::MaxReturn => (-mu.dot(w), -mu),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};
    use rstest::rstest;

    #[rstest]
    #[case(0.0, Target::MinVol, true, Objective::MinVariance)]
    #[case(0.0, Target::MaxReturn, true, Objective::MaxReturn)]
    #[case(0.0, Target::MaxReturn, false, Objective::MinVariance)]
    #[case(2.0, Target::MaxReturn, true, Objective::RiskAdjustedReturn { risk_aversion: 2.0 })]
    #[case(2.0, Target::MinVol, false, Objective::MinVariance)]
    fn test_objective_selection(
        #[case] risk_aversion: f64,
        #[case] target: Target,
        #[case] has_mu: bool,
        #[case] expected: Objective,
    ) {
        let constraints = Constraints::builder()
            .risk_aversion(risk_aversion)
            .target(target)
            .build()
            .unwrap();
        assert_eq!(Objective::for_constraints(&constraints, has_mu), expected);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let cov: Array2<f64> = array![[0.04, 0.01], [0.01, 0.09]];
        let mu = array![0.1, 0.2];
        let w = array![0.3, 0.5];
        let objective = Objective::RiskAdjustedReturn { risk_aversion: 3.0 };

        let eval = |w: &Array1<f64>| {
            let sw = cov.dot(w);
            objective.evaluate(w, &sw, w.dot(&sw), &mu)
        };
        let (_, grad) = eval(&w);

        let h = 1e-7;
        for i in 0..2 {
            let mut up = w.clone();
            up[i] += h;
            let mut down = w.clone();
            down[i] -= h;
            let fd = (eval(&up).0 - eval(&down).0) / (2.0 * h);
            assert_relative_eq!(grad[i], fd, epsilon = 1e-6);
        }
    }
}
