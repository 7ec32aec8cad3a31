//! Portfolio constraints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Region cap used when a region has no explicit limit.
pub const DEFAULT_REGION_LIMIT: f64 = 1.0;

/// What the optimizer aims for when no risk/return trade-off applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Minimize variance
    #[default]
    MinVol,
    /// Maximize expected return
    MaxReturn,
}

/// Invalid constraint values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    /// Region cap outside [0, 1]
    #[error("Region limit for {region} must be in [0, 1], got {value}")]
    RegionLimit {
        /// Region code
        region: String,
        /// Rejected value
        value: f64,
    },

    /// Position cap outside (0, 1]
    #[error("Position limit must be in (0, 1], got {0}")]
    PositionLimit(f64),

    /// Cash bounds not ordered inside [0, 1]
    #[error("Cash bounds must satisfy 0 <= min <= max <= 1, got ({min}, {max})")]
    CashBounds {
        /// Minimum cash
        min: f64,
        /// Maximum cash
        max: f64,
    },

    /// Negative or non-finite risk aversion
    #[error("Risk aversion must be finite and >= 0, got {0}")]
    RiskAversion(f64),

    /// Non-positive or non-finite volatility cap
    #[error("Target volatility must be finite and > 0, got {0}")]
    TargetVol(f64),
}

/// Validated portfolio constraints.
///
/// Construct with [`Constraints::builder`]. Values are never clamped: anything out of
/// range is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConstraintFields", into = "ConstraintFields")]
pub struct Constraints {
    region_limits: BTreeMap<String, f64>,
    position_limit: f64,
    cash_min: f64,
    cash_max: f64,
    target: Target,
    risk_aversion: f64,
    target_vol: Option<f64>,
}

impl Constraints {
    /// Start building constraints from the defaults.
    pub fn builder() -> ConstraintsBuilder {
        ConstraintsBuilder::default()
    }

    /// Explicit region caps.
    pub const fn region_limits(&self) -> &BTreeMap<String, f64> {
        &self.region_limits
    }

    /// Cap for `region`, 1.0 when not listed.
    pub fn region_limit(&self, region: &str) -> f64 {
        self.region_limits
            .get(region)
            .copied()
            .unwrap_or(DEFAULT_REGION_LIMIT)
    }

    /// Explicit cap for `region`, if any.
    pub fn explicit_region_limit(&self, region: &str) -> Option<f64> {
        self.region_limits.get(region).copied()
    }

    /// Maximum weight per position.
    pub const fn position_limit(&self) -> f64 {
        self.position_limit
    }

    /// `(min_cash, max_cash)`.
    pub const fn cash_bounds(&self) -> (f64, f64) {
        (self.cash_min, self.cash_max)
    }

    /// Objective target.
    pub const fn target(&self) -> Target {
        self.target
    }

    /// Weight on expected return in the trade-off objective.
    pub const fn risk_aversion(&self) -> f64 {
        self.risk_aversion
    }

    /// Annualized volatility cap, if any.
    pub const fn target_vol(&self) -> Option<f64> {
        self.target_vol
    }

    /// `1 - max_cash`.
    pub fn invest_min(&self) -> f64 {
        1.0 - self.cash_max
    }

    /// `1 - min_cash`.
    pub fn invest_max(&self) -> f64 {
        1.0 - self.cash_min
    }
}

impl Default for Constraints {
    fn default() -> Self {
        let b = ConstraintsBuilder::default();
        Self {
            region_limits: b.region_limits,
            position_limit: b.position_limit,
            cash_min: b.cash_min,
            cash_max: b.cash_max,
            target: b.target,
            risk_aversion: b.risk_aversion,
            target_vol: b.target_vol,
        }
    }
}

/// Builder for [`Constraints`].
#[derive(Debug, Clone)]
pub struct ConstraintsBuilder {
    region_limits: BTreeMap<String, f64>,
    position_limit: f64,
    cash_min: f64,
    cash_max: f64,
    target: Target,
    risk_aversion: f64,
    target_vol: Option<f64>,
}

impl Default for ConstraintsBuilder {
    fn default() -> Self {
        Self {
            region_limits: BTreeMap::new(),
            position_limit: 0.07,
            cash_min: 0.0,
            cash_max: 0.10,
            target: Target::MinVol,
            risk_aversion: 0.0,
            target_vol: None,
        }
    }
}

impl ConstraintsBuilder {
    /// Set the cap for one region.
    pub fn region_limit(mut self, region: impl Into<String>, limit: f64) -> Self {
        self.region_limits.insert(region.into(), limit);
        self
    }

    /// Replace all region caps.
    pub fn region_limits<I, S>(mut self, limits: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.region_limits = limits.into_iter().map(|(r, v)| (r.into(), v)).collect();
        self
    }

    /// Set the per-position cap.
    pub const fn position_limit(mut self, limit: f64) -> Self {
        self.position_limit = limit;
        self
    }

    /// Set the cash bounds.
    pub const fn cash_bounds(mut self, min: f64, max: f64) -> Self {
        self.cash_min = min;
        self.cash_max = max;
        self
    }

    /// Set the objective target.
    pub const fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Set the risk aversion.
    pub const fn risk_aversion(mut self, risk_aversion: f64) -> Self {
        self.risk_aversion = risk_aversion;
        self
    }

    /// Set or clear the volatility cap.
    pub const fn target_vol(mut self, target_vol: Option<f64>) -> Self {
        self.target_vol = target_vol;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Constraints, ConstraintError> {
        for (region, &value) in &self.region_limits {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConstraintError::RegionLimit {
                    region: region.clone(),
                    value,
                });
            }
        }

        if !(self.position_limit > 0.0 && self.position_limit <= 1.0) {
            return Err(ConstraintError::PositionLimit(self.position_limit));
        }

        let (min, max) = (self.cash_min, self.cash_max);
        if !(0.0 <= min && min <= max && max <= 1.0) {
            return Err(ConstraintError::CashBounds { min, max });
        }

        if !(self.risk_aversion.is_finite() && self.risk_aversion >= 0.0) {
            return Err(ConstraintError::RiskAversion(self.risk_aversion));
        }

        if let Some(vol) = self.target_vol
            && !(vol.is_finite() && vol > 0.0)
        {
            return Err(ConstraintError::TargetVol(vol));
        }

        Ok(Constraints {
            region_limits: self.region_limits,
            position_limit: self.position_limit,
            cash_min: min,
            cash_max: max,
            target: self.target,
            risk_aversion: self.risk_aversion,
            target_vol: self.target_vol,
        })
    }
}

/// Wire form of [`Constraints`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConstraintFields {
    #[serde(default)]
    region_limits: BTreeMap<String, f64>,
    position_limit: f64,
    cash_bounds: (f64, f64),
    #[serde(default)]
    target: Target,
    #[serde(default)]
    risk_aversion: f64,
    #[serde(default)]
    target_vol: Option<f64>,
}

impl TryFrom<ConstraintFields> for Constraints {
    type Error = ConstraintError;

    fn try_from(fields: ConstraintFields) -> Result<Self, Self::Error> {
        Self::builder()
            .region_limits(fields.region_limits)
            .position_limit(fields.position_limit)
            .cash_bounds(fields.cash_bounds.0, fields.cash_bounds.1)
            .target(fields.target)
            .risk_aversion(fields.risk_aversion)
            .target_vol(fields.target_vol)
            .build()
    }
}

impl From<Constraints> for ConstraintFields {
    fn from(c: Constraints) -> Self {
        Self {
            region_limits: c.region_limits,
            position_limit: c.position_limit,
            cash_bounds: (c.cash_min, c.cash_max),
            target: c.target,
            risk_aversion: c.risk_aversion,
            target_vol: c.target_vol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let c = Constraints::builder().build().unwrap();
        assert_eq!(c.position_limit(), 0.07);
        assert_eq!(c.cash_bounds(), (0.0, 0.10));
        assert_eq!(c.target(), Target::MinVol);
        assert_eq!(c.region_limit("US"), 1.0);
        assert_eq!(c, Constraints::default());
    }

    #[test]
    fn test_invest_bounds() {
        let c = Constraints::builder()
            .cash_bounds(0.05, 0.2)
            .build()
            .unwrap();
        assert!((c.invest_min() - 0.8).abs() < 1e-12);
        assert!((c.invest_max() - 0.95).abs() < 1e-12);
    }

    #[rstest]
    #[case(Constraints::builder().region_limit("US", 1.2))]
    #[case(Constraints::builder().region_limit("JP", -0.1))]
    #[case(Constraints::builder().region_limit("EU", f64::NAN))]
    #[case(Constraints::builder().position_limit(0.0))]
    #[case(Constraints::builder().position_limit(1.5))]
    #[case(Constraints::builder().cash_bounds(0.3, 0.1))]
    #[case(Constraints::builder().cash_bounds(-0.1, 0.1))]
    #[case(Constraints::builder().cash_bounds(0.0, 1.1))]
    #[case(Constraints::builder().risk_aversion(-1.0))]
    #[case(Constraints::builder().target_vol(Some(0.0)))]
    #[case(Constraints::builder().target_vol(Some(f64::INFINITY)))]
    fn test_invalid_values_are_rejected(#[case] builder: ConstraintsBuilder) {
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Constraints = serde_json::from_str(
            r#"{"region_limits": {"US": 0.5}, "position_limit": 0.1, "cash_bounds": [0.0, 0.2]}"#,
        )
        .unwrap();
        assert_eq!(ok.region_limit("US"), 0.5);

        let bad = serde_json::from_str::<Constraints>(
            r#"{"position_limit": 2.0, "cash_bounds": [0.0, 0.2]}"#,
        );
        assert!(bad.is_err());
    }
}
