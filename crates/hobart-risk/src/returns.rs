//! Price panel to returns panel.

use chrono::NaiveDate;
use hobart_data::PricePanel;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// How returns are computed from consecutive prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnsMethod {
    /// `p_t / p_{t-1} - 1`
    #[default]
    Pct,
    /// `ln(p_t / p_{t-1})`
    Log,
}

/// Date-ordered returns with ticker columns. Missing cells are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsPanel {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    values: Array2<f64>,
}

impl ReturnsPanel {
    /// Row labels.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column labels.
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Returns matrix (dates x tickers).
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of return rows.
    pub fn n_periods(&self) -> usize {
        self.dates.len()
    }

    /// True when there are no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.tickers.is_empty()
    }
}

/// Compute returns from a price panel.
///
/// Missing prices are not filled: a return is missing whenever either endpoint is.
/// Rows where every return is missing (always including the first) are dropped.
pub fn compute_returns(prices: &PricePanel, method: ReturnsMethod) -> ReturnsPanel {
    let raw = period_returns(prices.values().view(), method);

    let keep: Vec<usize> = raw
        .axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, row)| row.iter().any(|v| !v.is_nan()))
        .map(|(i, _)| i)
        .collect();

    ReturnsPanel {
        dates: keep.iter().map(|&i| prices.dates()[i]).collect(),
        tickers: prices.tickers().to_vec(),
        values: raw.select(Axis(0), &keep),
    }
}

/// Row-over-row returns of a price matrix. The first row is all `NaN`.
pub fn period_returns(prices: ArrayView2<'_, f64>, method: ReturnsMethod) -> Array2<f64> {
    let (rows, cols) = prices.dim();
    let mut out = Array2::from_elem((rows, cols), f64::NAN);

    for t in 1..rows {
        for j in 0..cols {
            let prev = prices[[t - 1, j]];
            let curr = prices[[t, j]];
            if prev.is_finite() && curr.is_finite() && prev != 0.0 {
                out[[t, j]] = match method {
                    ReturnsMethod::Pct => curr / prev - 1.0,
                    ReturnsMethod::Log => (curr / prev).ln(),
                };
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect()
    }

    #[test]
    fn test_missing_price_drops_all_missing_rows() {
        let prices = PricePanel::new(
            dates(5),
            vec!["AAA".into()],
            array![[100.0], [101.0], [f64::NAN], [103.0], [104.0]],
        )
        .unwrap();

        let returns = compute_returns(&prices, ReturnsMethod::Pct);
        assert_eq!(returns.n_periods(), 2);
        let d = dates(5);
        assert_eq!(returns.dates(), &[d[1], d[4]]);
        assert_relative_eq!(returns.values()[[0, 0]], 0.01, epsilon = 1e-12);
        assert_relative_eq!(returns.values()[[1, 0]], 104.0 / 103.0 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_partial_rows_are_kept() {
        let prices = PricePanel::new(
            dates(3),
            vec!["A".into(), "B".into()],
            array![[10.0, f64::NAN], [11.0, 20.0], [12.1, 22.0]],
        )
        .unwrap();

        let returns = compute_returns(&prices, ReturnsMethod::Pct);
        assert_eq!(returns.n_periods(), 2);
        assert!(returns.values()[[0, 1]].is_nan());
        assert_relative_eq!(returns.values()[[1, 1]], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_log_returns() {
        let prices =
            PricePanel::new(dates(2), vec!["A".into()], array![[100.0], [110.0]]).unwrap();
        let returns = compute_returns(&prices, ReturnsMethod::Log);
        assert_relative_eq!(returns.values()[[0, 0]], (1.1f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_panel_gives_empty_returns() {
        let returns = compute_returns(&PricePanel::empty(), ReturnsMethod::Pct);
        assert!(returns.is_empty());
    }
}
