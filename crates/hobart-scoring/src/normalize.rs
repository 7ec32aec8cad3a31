//! Min-max normalization of feature tables.

use crate::{error::Result, features::IDENTITY_COLUMNS};
use polars::prelude::*;

/// Value assigned to constant or entirely missing columns.
pub const NEUTRAL: f64 = 0.5;

/// Growth rates beyond this magnitude are clipped before mapping into `[0, 1]`.
pub const GROWTH_CLIP: f64 = 0.5;

fn min_max(name: &str) -> Expr {
    let raw = col(name).cast(DataType::Float64);
    let filled = raw.clone().fill_null(raw.median());
    let lo = filled.clone().min();
    let hi = filled.clone().max();

    when(hi.clone().eq(lo.clone()))
        .then(lit(NEUTRAL))
        .otherwise((filled - lo.clone()) / (hi - lo))
        .fill_null(lit(NEUTRAL))
        .alias(name)
}

/// Scale every feature column into `[0, 1]`.
///
/// Missing values are filled with the column median first. Columns that are
/// constant or entirely missing become [`NEUTRAL`]. `ticker` and `name` pass
/// through untouched.
pub fn normalize_features(df: &DataFrame) -> Result<DataFrame> {
    let exprs: Vec<Expr> = df
        .get_column_names()
        .into_iter()
        .filter(|name| !IDENTITY_COLUMNS.contains(&name.as_str()))
        .map(|name| min_max(name.as_str()))
        .collect();

    if exprs.is_empty() {
        return Ok(df.clone());
    }
    Ok(df.clone().lazy().with_columns(exprs).collect()?)
}

/// Map a growth rate into `[0, 1]`.
///
/// Rates are clipped to `[-0.5, 0.5]` and shifted linearly, so 0% growth maps to
/// 0.5. Missing or non-finite rates are neutral.
pub fn normalize_growth_rate(rate: Option<f64>) -> f64 {
    match rate {
        Some(r) if r.is_finite() => (r.clamp(-GROWTH_CLIP, GROWTH_CLIP) + GROWTH_CLIP) / (2.0 * GROWTH_CLIP),
        _ => NEUTRAL,
    }
}
