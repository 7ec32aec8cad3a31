//! Rule-based regional allocation tilt.

use std::collections::BTreeMap;

/// Starting weight of each known region.
pub const BASE_REGION_WEIGHTS: [(&str, f64); 4] =
    [("US", 0.45), ("JP", 0.25), ("EU", 0.20), ("CN", 0.10)];

/// Base weight of `region`, 0 when unknown.
pub fn base_weight(region: &str) -> f64 {
    BASE_REGION_WEIGHTS
        .iter()
        .find(|(r, _)| *r == region)
        .map_or(0.0, |(_, w)| *w)
}

/// Base weights of `regions` renormalized to sum to one.
///
/// Unknown regions get 0. When no requested region is known every weight is 0.
pub fn region_tilt(regions: &[String]) -> BTreeMap<String, f64> {
    let total: f64 = regions.iter().map(|r| base_weight(r)).sum();
    let scale = if total > 0.0 { total } else { 1.0 };

    regions
        .iter()
        .map(|r| (r.clone(), base_weight(r) / scale))
        .collect()
}
