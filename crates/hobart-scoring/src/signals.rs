//! Valuation and growth buy signals.

use hobart_data::FundamentalsTable;
use serde::{Deserialize, Serialize};

/// Thresholds for the buy-signal screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    /// P/E must be below this
    pub pe: f64,
    /// P/B must be below this
    pub pb: f64,
    /// Revenue growth must exceed this
    pub revenue_growth: f64,
    /// EPS growth must exceed this
    pub eps_growth: f64,
    /// PEG must be below this
    pub peg_ratio: f64,
    /// Signals needed for a BUY
    pub min_signals: usize,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            pe: 15.0,
            pb: 1.5,
            revenue_growth: 0.05,
            eps_growth: 0.10,
            peg_ratio: 1.0,
            min_signals: 3,
        }
    }
}

/// Valuation and growth metrics for one ticker. Missing values never count as a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalMetrics {
    /// Trailing P/E
    pub pe: Option<f64>,
    /// Price to book
    pub pb: Option<f64>,
    /// Revenue growth rate
    pub revenue_growth: Option<f64>,
    /// EPS growth rate
    pub eps_growth: Option<f64>,
    /// PEG ratio
    pub peg_ratio: Option<f64>,
}

impl SignalMetrics {
    /// Read the metrics for `ticker` from a fundamentals table.
    ///
    /// Field names are `pe`, `pb`, `revenue_growth`, `eps_growth` and `peg_ratio`.
    pub fn from_table(table: &FundamentalsTable, ticker: &str) -> Self {
        Self {
            pe: table.get(ticker, "pe"),
            pb: table.get(ticker, "pb"),
            revenue_growth: table.get(ticker, "revenue_growth"),
            eps_growth: table.get(ticker, "eps_growth"),
            peg_ratio: table.get(ticker, "peg_ratio"),
        }
    }
}

/// Screen outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    /// Enough signals met
    Buy,
    /// Not enough signals
    Hold,
}

/// Evaluated buy signal for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuySignal {
    /// Ticker
    pub ticker: String,
    /// Inputs
    #[serde(flatten)]
    pub metrics: SignalMetrics,
    /// Signals met, 0 to 5
    pub score: usize,
    /// Decision
    pub decision: Decision,
}

impl SignalThresholds {
    /// Count the signals `metrics` meets.
    pub fn count(&self, metrics: &SignalMetrics) -> usize {
        let below = |v: Option<f64>, limit: f64| v.is_some_and(|v| v < limit);
        let above = |v: Option<f64>, limit: f64| v.is_some_and(|v| v > limit);
        [
            below(metrics.pe, self.pe),
            below(metrics.pb, self.pb),
            above(metrics.revenue_growth, self.revenue_growth),
            above(metrics.eps_growth, self.eps_growth),
            below(metrics.peg_ratio, self.peg_ratio),
        ]
        .into_iter()
        .filter(|met| *met)
        .count()
    }

    /// Evaluate one ticker.
    pub fn evaluate(&self, ticker: impl Into<String>, metrics: SignalMetrics) -> BuySignal {
        let score = self.count(&metrics);
        BuySignal {
            ticker: ticker.into(),
            metrics,
            score,
            decision: if score >= self.min_signals {
                Decision::Buy
            } else {
                Decision::Hold
            },
        }
    }
}

/// Evaluate buy signals for `tickers` from a fundamentals table.
pub fn evaluate_buy_signals(
    tickers: &[String],
    table: &FundamentalsTable,
    thresholds: &SignalThresholds,
) -> Vec<BuySignal> {
    tickers
        .iter()
        .map(|t| thresholds.evaluate(t.clone(), SignalMetrics::from_table(table, t)))
        .collect()
}
