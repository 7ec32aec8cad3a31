//! Daily price history from Yahoo Finance.

use crate::{
    error::{DataError, Result},
    panel::PricePanel,
    source::{PriceHistory, PriceSource},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use polars::prelude::*;
use std::time::Duration;
use tokio::time::sleep;
use yahoo_finance_api as yahoo;

/// Yahoo Finance price source with rate limiting.
pub struct YahooPriceSource {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for YahooPriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooPriceSource")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl YahooPriceSource {
    /// Create a source with the default rate limit (4 requests per second).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(250))
    }

    /// Create a source that waits `rate_limit_delay` after each request.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
        })
    }

    /// Fetch daily bars for one symbol.
    ///
    /// # Returns
    /// A long DataFrame with columns: symbol, date, close, volume
    pub async fn fetch_quotes(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<DataFrame> {
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let start_time = time::OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| DataError::TimeConversion(e.to_string()))?;
        let end_time = time::OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| DataError::TimeConversion(e.to_string()))?;

        let response = self
            .provider
            .get_quote_history(symbol, start_time, end_time)
            .await?;
        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        if quotes.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No data returned from Yahoo Finance".to_string(),
            });
        }

        let timestamps: Vec<i64> = quotes.iter().map(|q| q.timestamp).collect();
        let closes: Vec<f64> = quotes.iter().map(|q| q.adjclose).collect();
        let volumes: Vec<f64> = quotes.iter().map(|q| q.volume as f64).collect();

        let df = DataFrame::new(vec![
            Series::new("symbol".into(), vec![symbol; quotes.len()]).into(),
            Series::new("timestamp".into(), timestamps).into(),
            Series::new("close".into(), closes).into(),
            Series::new("volume".into(), volumes).into(),
        ])?;

        let df = df
            .lazy()
            .with_column(
                (col("timestamp") * lit(1_000_000_000))
                    .cast(DataType::Datetime(TimeUnit::Nanoseconds, None))
                    .cast(DataType::Date)
                    .alias("date"),
            )
            .select(&[col("symbol"), col("date"), col("close"), col("volume")])
            .collect()?;

        sleep(self.rate_limit_delay).await;

        Ok(df)
    }
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    async fn price_history(&self, tickers: &[String], lookback_days: u32) -> Result<PriceHistory> {
        if lookback_days == 0 {
            return Err(DataError::InvalidLookback(lookback_days));
        }

        let end = Utc::now();
        // Calendar days; trading days are roughly 5/7 of them.
        let start = end - ChronoDuration::days(i64::from(lookback_days) * 7 / 5 + 7);

        let mut frames = Vec::new();
        for ticker in tickers {
            match self.fetch_quotes(ticker, start, end).await {
                Ok(df) => frames.push(df.lazy()),
                Err(e) => tracing::warn!(%ticker, error = %e, "failed to fetch prices"),
            }
        }

        if frames.is_empty() {
            return Ok(PriceHistory::default());
        }

        let combined = concat(frames, UnionArgs::default())?.collect()?;
        let n = lookback_days as usize;
        Ok(PriceHistory {
            prices: PricePanel::from_long_frame(&combined, "close")?.tail(n),
            volumes: PricePanel::from_long_frame(&combined, "volume")?.tail(n),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_symbol() {
        let source = YahooPriceSource::new().unwrap();
        let end = Utc::now();
        let start = end - ChronoDuration::days(30);

        let result = source.fetch_quotes("", start, end).await;
        assert!(matches!(result, Err(DataError::InvalidSymbol(_))));
    }

    #[tokio::test]
    async fn test_zero_lookback_is_rejected() {
        let source = YahooPriceSource::new().unwrap();
        let result = source.price_history(&["AAPL".to_string()], 0).await;
        assert!(matches!(result, Err(DataError::InvalidLookback(0))));
    }
}
