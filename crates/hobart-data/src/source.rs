//! Collaborator interfaces for market data.
//!
//! Each source is a narrow capability trait injected by construction. Sources may
//! return partial data: a price source can omit tickers, a fundamentals source can
//! leave fields absent and a news source returns an empty list when it has nothing.

use crate::{error::Result, panel::PricePanel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Daily closes and volumes over a lookback window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    /// Close prices.
    pub prices: PricePanel,
    /// Traded volumes, same shape conventions as `prices`.
    pub volumes: PricePanel,
}

impl PriceHistory {
    /// True when no prices were returned.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Source of price and volume history.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch up to `lookback_days` of daily history for `tickers`.
    ///
    /// Tickers that cannot be fetched are left out of the result.
    async fn price_history(&self, tickers: &[String], lookback_days: u32) -> Result<PriceHistory>;
}

/// Named ratios per ticker. Missing values are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsTable {
    rows: BTreeMap<String, BTreeMap<String, f64>>,
}

impl FundamentalsTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one value. Non-finite values are ignored.
    pub fn insert(&mut self, ticker: impl Into<String>, field: impl Into<String>, value: f64) {
        if value.is_finite() {
            self.rows
                .entry(ticker.into())
                .or_default()
                .insert(field.into(), value);
        }
    }

    /// Look up one value.
    pub fn get(&self, ticker: &str, field: &str) -> Option<f64> {
        self.rows.get(ticker).and_then(|row| row.get(field)).copied()
    }

    /// All fields for one ticker.
    pub fn row(&self, ticker: &str) -> Option<&BTreeMap<String, f64>> {
        self.rows.get(ticker)
    }

    /// Whether any values are present.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Source of fundamental ratios.
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    /// Fetch `fields` for `tickers`.
    async fn fundamentals(&self, tickers: &[String], fields: &[&str]) -> Result<FundamentalsTable>;
}

/// A single news headline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Ticker the item is about
    pub ticker: String,
    /// Headline
    pub title: String,
    /// Publication time, when known
    pub published_at: Option<DateTime<Utc>>,
}

/// Source of recent news headlines.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Headlines for `tickers` from the last `lookback_days` days.
    async fn news(&self, tickers: &[String], lookback_days: u32) -> Result<Vec<NewsItem>>;
}

/// A fundamentals source that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFundamentals;

#[async_trait]
impl FundamentalsSource for NoFundamentals {
    async fn fundamentals(&self, _tickers: &[String], _fields: &[&str]) -> Result<FundamentalsTable> {
        Ok(FundamentalsTable::new())
    }
}

/// A news source that never has news.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNews;

#[async_trait]
impl NewsSource for NoNews {
    async fn news(&self, _tickers: &[String], _lookback_days: u32) -> Result<Vec<NewsItem>> {
        Ok(Vec::new())
    }
}

/// A price source backed by an in-memory history, used offline and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSource {
    history: PriceHistory,
}

impl StaticPriceSource {
    /// Serve `history` for every request.
    pub const fn new(history: PriceHistory) -> Self {
        Self { history }
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn price_history(&self, tickers: &[String], lookback_days: u32) -> Result<PriceHistory> {
        let n = lookback_days as usize;
        Ok(PriceHistory {
            prices: self.history.prices.select(tickers).tail(n),
            volumes: self.history.volumes.select(tickers).tail(n),
        })
    }
}

/// A static fundamentals table.
#[derive(Debug, Clone, Default)]
pub struct StaticFundamentals {
    table: FundamentalsTable,
}

impl StaticFundamentals {
    /// Serve `table` for every request.
    pub const fn new(table: FundamentalsTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl FundamentalsSource for StaticFundamentals {
    async fn fundamentals(&self, tickers: &[String], fields: &[&str]) -> Result<FundamentalsTable> {
        let mut out = FundamentalsTable::new();
        for ticker in tickers {
            for field in fields {
                if let Some(value) = self.table.get(ticker, field) {
                    out.insert(ticker.clone(), *field, value);
                }
            }
        }
        Ok(out)
    }
}
