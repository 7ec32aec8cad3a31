//! Date-indexed, ticker-columned panels.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, Axis, Slice};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A time-ordered panel of non-negative values (prices or volumes).
///
/// Rows are dates in ascending order, columns are tickers. Missing cells are `NaN`.
/// Every transform returns a new panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PanelSnapshot", try_from = "PanelSnapshot")]
pub struct PricePanel {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    values: Array2<f64>,
}

impl PricePanel {
    /// Create a panel, sorting rows by date.
    ///
    /// # Errors
    /// Fails when the value matrix does not match the labels or a ticker repeats.
    pub fn new(dates: Vec<NaiveDate>, tickers: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != dates.len() || values.ncols() != tickers.len() {
            return Err(DataError::ShapeMismatch {
                expected_rows: dates.len(),
                expected_cols: tickers.len(),
                rows: values.nrows(),
                cols: values.ncols(),
            });
        }

        let mut seen = BTreeSet::new();
        for ticker in &tickers {
            if !seen.insert(ticker.as_str()) {
                return Err(DataError::DuplicateTicker(ticker.clone()));
            }
        }

        let mut order: Vec<usize> = (0..dates.len()).collect();
        order.sort_by_key(|&i| dates[i]);
        let sorted_dates = order.iter().map(|&i| dates[i]).collect();
        let values = values.select(Axis(0), &order);

        Ok(Self {
            dates: sorted_dates,
            tickers,
            values,
        })
    }

    /// Build a panel from named columns of optional values sharing one date index.
    pub fn from_columns(dates: Vec<NaiveDate>, columns: Vec<(String, Vec<Option<f64>>)>) -> Result<Self> {
        let mut values = Array2::from_elem((dates.len(), columns.len()), f64::NAN);
        let mut tickers = Vec::with_capacity(columns.len());

        for (j, (ticker, column)) in columns.into_iter().enumerate() {
            if column.len() != dates.len() {
                return Err(DataError::ShapeMismatch {
                    expected_rows: dates.len(),
                    expected_cols: j + 1,
                    rows: column.len(),
                    cols: j + 1,
                });
            }
            for (i, value) in column.into_iter().enumerate() {
                values[[i, j]] = value.unwrap_or(f64::NAN);
            }
            tickers.push(ticker);
        }

        Self::new(dates, tickers, values)
    }

    /// A panel with no rows and no columns.
    pub fn empty() -> Self {
        Self {
            dates: Vec::new(),
            tickers: Vec::new(),
            values: Array2::zeros((0, 0)),
        }
    }

    /// Build a wide panel from a long frame with `symbol`, `date` and `value_column`.
    ///
    /// Rows with a null symbol or date are skipped. When a (date, symbol) pair
    /// repeats, the last value wins.
    pub fn from_long_frame(df: &DataFrame, value_column: &str) -> Result<Self> {
        let symbols = df.column("symbol")?.str()?;
        let dates = df.column("date")?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let values = df.column(value_column)?.cast(&DataType::Float64)?;
        let values = values.f64()?;

        let mut tickers: Vec<String> = Vec::new();
        let mut ticker_index: HashMap<String, usize> = HashMap::new();
        let mut rows: BTreeMap<NaiveDate, HashMap<usize, f64>> = BTreeMap::new();

        for i in 0..df.height() {
            let (Some(symbol), Some(date)) = (symbols.get(i), dates.get(i)) else {
                continue;
            };
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("Invalid date '{date}': {e}")))?;

            let j = match ticker_index.get(symbol) {
                Some(&j) => j,
                None => {
                    tickers.push(symbol.to_string());
                    ticker_index.insert(symbol.to_string(), tickers.len() - 1);
                    tickers.len() - 1
                }
            };

            let value = values.get(i).unwrap_or(f64::NAN);
            rows.entry(date).or_default().insert(j, value);
        }

        let mut matrix = Array2::from_elem((rows.len(), tickers.len()), f64::NAN);
        for (i, cells) in rows.values().enumerate() {
            for (&j, &value) in cells {
                matrix[[i, j]] = value;
            }
        }

        Self::new(rows.into_keys().collect(), tickers, matrix)
    }

    /// True when the panel has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.tickers.is_empty()
    }

    /// Row labels.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column labels.
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// The value matrix (dates x tickers).
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of dates.
    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    /// Number of tickers.
    pub fn n_tickers(&self) -> usize {
        self.tickers.len()
    }

    /// Whether a column exists for `ticker`.
    pub fn has_ticker(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t == ticker)
    }

    /// The column for `ticker`, if present.
    pub fn column(&self, ticker: &str) -> Option<ArrayView1<'_, f64>> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|j| self.values.column(j))
    }

    /// Sub-panel with the requested tickers that are present, in request order.
    pub fn select(&self, tickers: &[String]) -> Self {
        let mut kept = Vec::new();
        let mut indices = Vec::new();
        for ticker in tickers {
            if kept.contains(ticker) {
                continue;
            }
            if let Some(j) = self.tickers.iter().position(|t| t == ticker) {
                kept.push(ticker.clone());
                indices.push(j);
            }
        }

        Self {
            dates: self.dates.clone(),
            tickers: kept,
            values: self.values.select(Axis(1), &indices),
        }
    }

    /// Outer join on date with a column union.
    ///
    /// Columns of `self` come first. For a ticker present in both panels a
    /// cell from `self` wins unless it is missing.
    pub fn outer_join(&self, other: &Self) -> Self {
        let dates: Vec<NaiveDate> = self
            .dates
            .iter()
            .chain(other.dates.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut tickers = self.tickers.clone();
        for ticker in &other.tickers {
            if !tickers.contains(ticker) {
                tickers.push(ticker.clone());
            }
        }
        let col_of: HashMap<&str, usize> = tickers
            .iter()
            .enumerate()
            .map(|(j, t)| (t.as_str(), j))
            .collect();

        let mut values = Array2::from_elem((dates.len(), tickers.len()), f64::NAN);
        for panel in [self, other] {
            for (i, date) in panel.dates.iter().enumerate() {
                let row = row_of[date];
                for (j, ticker) in panel.tickers.iter().enumerate() {
                    let value = panel.values[[i, j]];
                    let cell = &mut values[[row, col_of[ticker.as_str()]]];
                    if cell.is_nan() {
                        *cell = value;
                    }
                }
            }
        }

        Self {
            dates,
            tickers,
            values,
        }
    }

    /// Keep only the last `n` dates.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.dates.len().saturating_sub(n);
        Self {
            dates: self.dates[start..].to_vec(),
            tickers: self.tickers.clone(),
            values: self.values.slice_axis(Axis(0), Slice::from(start..)).to_owned(),
        }
    }
}

impl Default for PricePanel {
    fn default() -> Self {
        Self::empty()
    }
}

/// Serialized form of a panel; `NaN` cells become `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PanelSnapshot {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

impl From<PricePanel> for PanelSnapshot {
    fn from(panel: PricePanel) -> Self {
        let rows = panel
            .values
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|v| (!v.is_nan()).then_some(*v)).collect())
            .collect();
        Self {
            dates: panel.dates,
            tickers: panel.tickers,
            rows,
        }
    }
}

impl TryFrom<PanelSnapshot> for PricePanel {
    type Error = DataError;

    fn try_from(snapshot: PanelSnapshot) -> Result<Self> {
        let n_cols = snapshot.tickers.len();
        let mut values = Array2::from_elem((snapshot.rows.len(), n_cols), f64::NAN);
        for (i, row) in snapshot.rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(DataError::ShapeMismatch {
                    expected_rows: snapshot.dates.len(),
                    expected_cols: n_cols,
                    rows: snapshot.rows.len(),
                    cols: row.len(),
                });
            }
            for (j, value) in row.iter().enumerate() {
                values[[i, j]] = value.unwrap_or(f64::NAN);
            }
        }
        Self::new(snapshot.dates, snapshot.tickers, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_new_sorts_rows_by_date() {
        let panel = PricePanel::new(
            vec![day(3), day(1), day(2)],
            vec!["AAA".into()],
            array![[3.0], [1.0], [2.0]],
        )
        .unwrap();

        assert_eq!(panel.dates(), &[day(1), day(2), day(3)]);
        assert_eq!(panel.values().column(0).to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_new_rejects_bad_shape_and_duplicates() {
        let shape = PricePanel::new(vec![day(1)], vec!["A".into(), "B".into()], array![[1.0]]);
        assert!(matches!(shape, Err(DataError::ShapeMismatch { .. })));

        let dup = PricePanel::new(vec![day(1)], vec!["A".into(), "A".into()], array![[1.0, 2.0]]);
        assert!(matches!(dup, Err(DataError::DuplicateTicker(_))));
    }

    #[test]
    fn test_select_keeps_request_order_and_skips_missing() {
        let panel = PricePanel::new(
            vec![day(1)],
            vec!["A".into(), "B".into(), "C".into()],
            array![[1.0, 2.0, 3.0]],
        )
        .unwrap();

        let sub = panel.select(&["C".into(), "X".into(), "A".into()]);
        assert_eq!(sub.tickers(), &["C".to_string(), "A".to_string()]);
        assert_eq!(sub.values().row(0).to_vec(), vec![3.0, 1.0]);
    }

    #[test]
    fn test_outer_join_unions_dates_and_columns() {
        let us = PricePanel::new(vec![day(1), day(2)], vec!["AAPL".into()], array![[1.0], [2.0]])
            .unwrap();
        let jp = PricePanel::new(vec![day(2), day(3)], vec!["7203.T".into()], array![[5.0], [6.0]])
            .unwrap();

        let merged = us.outer_join(&jp);
        assert_eq!(merged.dates(), &[day(1), day(2), day(3)]);
        assert_eq!(merged.tickers().len(), 2);
        assert!(merged.values()[[0, 1]].is_nan());
        assert!(merged.values()[[2, 0]].is_nan());
        assert_eq!(merged.values()[[1, 1]], 5.0);
    }

    #[test]
    fn test_from_long_frame() {
        let df = df! {
            "symbol" => ["A", "B", "A"],
            "date" => ["2024-01-02", "2024-01-02", "2024-01-01"],
            "close" => [10.0, 20.0, 9.0],
        }
        .unwrap();

        let panel = PricePanel::from_long_frame(&df, "close").unwrap();
        assert_eq!(panel.dates(), &[day(1), day(2)]);
        assert_eq!(panel.tickers(), &["A".to_string(), "B".to_string()]);
        assert_eq!(panel.values()[[0, 0]], 9.0);
        assert!(panel.values()[[0, 1]].is_nan());
        assert_eq!(panel.values()[[1, 1]], 20.0);
    }

    #[test]
    fn test_serde_preserves_missing_cells() {
        let panel = PricePanel::new(
            vec![day(1), day(2)],
            vec!["A".into()],
            array![[f64::NAN], [2.0]],
        )
        .unwrap();

        let json = serde_json::to_string(&panel).unwrap();
        assert!(json.contains("null"));
        let back: PricePanel = serde_json::from_str(&json).unwrap();
        assert!(back.values()[[0, 0]].is_nan());
        assert_eq!(back.values()[[1, 0]], 2.0);
    }

    #[test]
    fn test_tail_keeps_latest_rows() {
        let panel = PricePanel::new(
            vec![day(1), day(2), day(3)],
            vec!["A".into()],
            array![[1.0], [2.0], [3.0]],
        )
        .unwrap();
        let last = panel.tail(2);
        assert_eq!(last.dates(), &[day(2), day(3)]);
        assert!(panel.tail(10).n_dates() == 3);
    }
}
