//! Cache wrapper around a price source.

use super::Cache;
use crate::{
    error::Result,
    source::{PriceHistory, PriceSource},
};
use async_trait::async_trait;
use std::sync::Arc;

/// A [`PriceSource`] that serves repeated requests from a [`Cache`].
///
/// Entries are keyed by the sorted ticker set and the lookback window.
#[derive(Debug)]
pub struct CachedPriceSource<S> {
    inner: S,
    cache: Arc<dyn Cache>,
}

impl<S> CachedPriceSource<S> {
    /// Wrap `inner` with `cache`.
    pub fn new(inner: S, cache: Arc<dyn Cache>) -> Self {
        Self { inner, cache }
    }

    /// Cache key for a request.
    pub fn cache_key(tickers: &[String], lookback_days: u32) -> String {
        let mut sorted: Vec<&str> = tickers.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();
        format!("prices:{lookback_days}:{}", sorted.join(","))
    }
}

#[async_trait]
impl<S: PriceSource> PriceSource for CachedPriceSource<S> {
    async fn price_history(&self, tickers: &[String], lookback_days: u32) -> Result<PriceHistory> {
        let key = Self::cache_key(tickers, lookback_days);

        if let Some(raw) = self.cache.get(&key)? {
            match serde_json::from_str::<PriceHistory>(&raw) {
                Ok(history) => {
                    tracing::debug!(%key, "price cache hit");
                    return Ok(history);
                }
                Err(e) => tracing::warn!(%key, error = %e, "discarding unreadable cache entry"),
            }
        }

        tracing::debug!(%key, "price cache miss");
        let history = self.inner.price_history(tickers, lookback_days).await?;
        if !history.is_empty() {
            self.cache.put(&key, &serde_json::to_string(&history)?)?;
        }
        Ok(history)
    }
}
