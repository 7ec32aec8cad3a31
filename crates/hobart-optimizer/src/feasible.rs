//! The linear part of the feasible region and Euclidean projection onto it.
//!
//! The set is
//!
//! ```text
//! { w : 0 <= w_i <= u,  sum_{i in r} w_i <= c_r,  lo <= sum w <= hi }
//! ```
//!
//! Its projection has the form `w_i = clip(y_i - ν - λ_r(i), 0, u)` with one shift
//! `ν` for the budget and one `λ_r >= 0` per region. For fixed `ν` each region's
//! total is piecewise linear in `λ_r`, so `λ_r` is solved exactly; `ν` is found by
//! bisection on the monotone total.

use crate::constraints::Constraints;
use ndarray::Array1;
use std::collections::BTreeMap;

const BISECTION_STEPS: usize = 200;

#[derive(Debug, Clone)]
struct RegionGroup {
    region: String,
    members: Vec<usize>,
    cap: f64,
}

/// Box, region and budget constraints for one universe.
#[derive(Debug, Clone)]
pub struct FeasibleSet {
    n: usize,
    upper: f64,
    invest_min: f64,
    invest_max: f64,
    groups: Vec<RegionGroup>,
}

impl FeasibleSet {
    /// Build the set for assets with the given `regions`.
    ///
    /// The lower budget bound is tightened to the most the box and region caps can
    /// hold, so the set is never empty.
    pub fn new(regions: &[String], constraints: &Constraints) -> Self {
        let upper = constraints.position_limit();

        let mut by_region: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, region) in regions.iter().enumerate() {
            by_region.entry(region.as_str()).or_default().push(i);
        }

        let groups: Vec<RegionGroup> = by_region
            .into_iter()
            .map(|(region, members)| RegionGroup {
                region: region.to_string(),
                cap: constraints.region_limit(region),
                members,
            })
            .collect();

        let capacity: f64 = groups
            .iter()
            .map(|g| g.cap.min(g.members.len() as f64 * upper))
            .sum();
        let n = regions.len();
        let invest_min = constraints
            .invest_min()
            .min(n as f64 * upper)
            .min(capacity);

        Self {
            n,
            upper,
            invest_min,
            invest_max: constraints.invest_max(),
            groups,
        }
    }

    /// Number of assets.
    pub const fn len(&self) -> usize {
        self.n
    }

    /// True for an empty universe.
    pub const fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Lower budget bound after tightening.
    pub const fn effective_invest_min(&self) -> f64 {
        self.invest_min
    }

    /// Upper budget bound.
    pub const fn invest_max(&self) -> f64 {
        self.invest_max
    }

    /// Per-position cap.
    pub const fn upper(&self) -> f64 {
        self.upper
    }

    /// Region caps in effect, keyed by region.
    pub fn region_caps(&self) -> BTreeMap<&str, f64> {
        self.groups
            .iter()
            .map(|g| (g.region.as_str(), g.cap))
            .collect()
    }

    fn clip(&self, v: f64) -> f64 {
        v.clamp(0.0, self.upper)
    }

    fn group_sum(&self, group: &RegionGroup, y: &Array1<f64>, shift: f64) -> f64 {
        group.members.iter().map(|&i| self.clip(y[i] - shift)).sum()
    }

    /// Total weight after projecting with budget shift `nu`.
    fn total(&self, y: &Array1<f64>, nu: f64) -> f64 {
        self.groups
            .iter()
            .map(|g| self.group_sum(g, y, nu).min(g.cap))
            .sum()
    }

    /// Euclidean projection of `y` onto the set.
    pub fn project(&self, y: &Array1<f64>) -> Array1<f64> {
        let nu = self.budget_shift(y);
        let mut out = Array1::zeros(self.n);
        for group in &self.groups {
            let lambda = self.region_shift(group, y, nu);
            for &i in &group.members {
                out[i] = self.clip(y[i] - nu - lambda);
            }
        }
        out
    }

    fn budget_shift(&self, y: &Array1<f64>) -> f64 {
        let total = self.total(y, 0.0);

        if total > self.invest_max {
            // every coordinate clips to 0 at nu = max(y)
            let mut lo = 0.0;
            let mut hi = y.iter().copied().fold(0.0, f64::max);
            for _ in 0..BISECTION_STEPS {
                let mid = 0.5 * (lo + hi);
                if mid <= lo || mid >= hi {
                    break;
                }
                if self.total(y, mid) > self.invest_max {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            hi
        } else if total < self.invest_min {
            // every coordinate clips to the upper bound at nu = min(y) - u
            let mut lo = y.iter().copied().fold(0.0, f64::min) - self.upper;
            let mut hi = 0.0;
            for _ in 0..BISECTION_STEPS {
                let mid = 0.5 * (lo + hi);
                if mid <= lo || mid >= hi {
                    break;
                }
                if self.total(y, mid) < self.invest_min {
                    hi = mid;
                } else {
                    lo = mid;
                }
            }
            lo
        } else {
            0.0
        }
    }

    /// Smallest `λ >= 0` bringing the group total down to its cap.
    fn region_shift(&self, group: &RegionGroup, y: &Array1<f64>, nu: f64) -> f64 {
        if self.group_sum(group, y, nu) <= group.cap {
            return 0.0;
        }

        let z: Vec<f64> = group.members.iter().map(|&i| y[i] - nu).collect();
        let h = |lambda: f64| -> f64 { z.iter().map(|&zi| self.clip(zi - lambda)).sum() };

        let mut breakpoints: Vec<f64> = z
            .iter()
            .flat_map(|&zi| [zi - self.upper, zi])
            .filter(|&p| p > 0.0)
            .collect();
        breakpoints.sort_by(f64::total_cmp);
        breakpoints.dedup();

        let (mut prev_lambda, mut prev_sum) = (0.0, h(0.0));
        for &p in &breakpoints {
            let sum = h(p);
            if sum <= group.cap {
                let t = (prev_sum - group.cap) / (prev_sum - sum);
                return prev_lambda + t * (p - prev_lambda);
            }
            prev_lambda = p;
            prev_sum = sum;
        }

        prev_lambda
    }

    /// Largest violation of any linear constraint (0 when feasible).
    pub fn max_violation(&self, w: &Array1<f64>) -> f64 {
        let mut worst: f64 = 0.0;
        for &wi in w {
            worst = worst.max(-wi).max(wi - self.upper);
        }

        let total = w.sum();
        worst = worst
            .max(total - self.invest_max)
            .max(self.invest_min - total);

        for group in &self.groups {
            let sum: f64 = group.members.iter().map(|&i| w[i]).sum();
            worst = worst.max(sum - group.cap);
        }

        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn regions(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_effective_invest_min_is_tightened_by_region_caps() {
        let constraints = Constraints::builder()
            .region_limit("US", 0.2)
            .region_limit("JP", 0.6)
            .position_limit(0.6)
            .cash_bounds(0.0, 0.0)
            .build()
            .unwrap();
        let set = FeasibleSet::new(&regions(&["US", "US", "JP", "JP"]), &constraints);

        assert_relative_eq!(set.effective_invest_min(), 0.8, epsilon = 1e-12);
        assert_relative_eq!(set.invest_max(), 1.0);
    }

    #[test]
    fn test_effective_invest_min_is_tightened_by_box() {
        let constraints = Constraints::builder()
            .position_limit(0.1)
            .cash_bounds(0.0, 0.05)
            .build()
            .unwrap();
        let set = FeasibleSet::new(&regions(&["US", "EU", "JP"]), &constraints);
        assert_relative_eq!(set.effective_invest_min(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_feasible_point_is_fixed() {
        let constraints = Constraints::builder()
            .position_limit(0.5)
            .cash_bounds(0.0, 0.2)
            .build()
            .unwrap();
        let set = FeasibleSet::new(&regions(&["US", "US", "JP"]), &constraints);
        let w = array![0.3, 0.2, 0.4];

        let p = set.project(&w);
        for (a, b) in p.iter().zip(w.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_projection_respects_every_constraint() {
        let constraints = Constraints::builder()
            .region_limit("US", 0.3)
            .region_limit("JP", 0.5)
            .position_limit(0.25)
            .cash_bounds(0.1, 0.3)
            .build()
            .unwrap();
        let set = FeasibleSet::new(&regions(&["US", "US", "US", "JP", "JP", "EU"]), &constraints);

        for y in [
            array![1.0, 0.9, 0.8, 0.7, 0.6, 0.5],
            array![-1.0, -2.0, 0.0, 0.0, -0.5, -0.1],
            array![0.05, 0.02, 0.01, 0.3, 0.3, 0.9],
        ] {
            let p = set.project(&y);
            assert!(set.max_violation(&p) < 1e-9, "violation for {y:?}: {p:?}");
        }
    }

    #[test]
    fn test_projection_onto_simplex_matches_closed_form() {
        let constraints = Constraints::builder()
            .position_limit(1.0)
            .cash_bounds(0.0, 0.0)
            .build()
            .unwrap();
        let set = FeasibleSet::new(&regions(&["US", "US", "US"]), &constraints);

        // sorted-threshold projection of (0.5, 0.3, -0.2) onto the simplex
        let p = set.project(&array![0.5, 0.3, -0.2]);
        assert_relative_eq!(p[0], 0.6, epsilon = 1e-10);
        assert_relative_eq!(p[1], 0.4, epsilon = 1e-10);
        assert_relative_eq!(p[2], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_region_cap_shift_is_exact() {
        let constraints = Constraints::builder()
            .region_limit("US", 0.3)
            .position_limit(1.0)
            .cash_bounds(0.0, 1.0)
            .build()
            .unwrap();
        let set = FeasibleSet::new(&regions(&["US", "US"]), &constraints);

        let p = set.project(&array![0.4, 0.2]);
        assert_relative_eq!(p[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(p[1], 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_region_cap_zeroes_the_region() {
        let constraints = Constraints::builder()
            .region_limit("CN", 0.0)
            .position_limit(0.5)
            .cash_bounds(0.0, 0.5)
            .build()
            .unwrap();
        let set = FeasibleSet::new(&regions(&["CN", "US"]), &constraints);

        let p = set.project(&array![0.5, 0.5]);
        assert_eq!(p[0], 0.0);
        assert_relative_eq!(p[1], 0.5, epsilon = 1e-12);
    }
}
