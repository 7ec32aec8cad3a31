//! Integration tests for cached price sources

use chrono::NaiveDate;
use hobart_data::{
    CachedPriceSource, ExpiryPolicy, PriceHistory, PricePanel, PriceSource, SqliteCache,
    StaticPriceSource,
};
use ndarray::Array2;
use std::sync::Arc;

fn history(tickers: &[&str], days: usize) -> PriceHistory {
    let dates: Vec<NaiveDate> = (0..days)
        .map(|d| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(d as i64))
        .collect();
    let values = Array2::from_shape_fn((days, tickers.len()), |(i, j)| 100.0 + (i + j) as f64);
    let tickers = tickers.iter().map(|t| t.to_string()).collect::<Vec<_>>();
    PriceHistory {
        prices: PricePanel::new(dates.clone(), tickers.clone(), values.clone()).unwrap(),
        volumes: PricePanel::new(dates, tickers, values * 1_000.0).unwrap(),
    }
}

#[tokio::test]
async fn test_sqlite_backed_source_round_trips_history() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(SqliteCache::new(dir.path().join("prices.db"), ExpiryPolicy::SameDay).unwrap());
    let source = CachedPriceSource::new(StaticPriceSource::new(history(&["AAPL", "MSFT"], 10)), cache.clone());

    let tickers = vec!["MSFT".to_string(), "AAPL".to_string(), "NVDA".to_string()];
    let fresh = source.price_history(&tickers, 5).await.unwrap();
    assert_eq!(fresh.prices.tickers(), &["MSFT".to_string(), "AAPL".to_string()]);
    assert_eq!(fresh.prices.n_dates(), 5);

    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.entries, 1);

    let cached = source.price_history(&tickers, 5).await.unwrap();
    assert_eq!(cached.prices.dates(), fresh.prices.dates());
    assert_eq!(cached.volumes.values(), fresh.volumes.values());
}

#[tokio::test]
async fn test_empty_history_is_not_cached() {
    let cache = Arc::new(SqliteCache::in_memory(ExpiryPolicy::SameDay).unwrap());
    let source = CachedPriceSource::new(StaticPriceSource::default(), cache.clone());

    let result = source.price_history(&["AAPL".to_string()], 30).await.unwrap();
    assert!(result.is_empty());
    assert_eq!(cache.get_stats().unwrap().entries, 0);
}
