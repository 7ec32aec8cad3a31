//! Wiring of data sources, universes and price panels for the CLI.

use super::cache_manager;
use hobart::{
    AppConfig, RegionScreener, RegionUniverse, ScreenSettings,
    data::{
        CachedPriceSource, DataError, NoFundamentals, NoNews, PricePanel, PriceSource,
        StaticPriceSource, YahooPriceSource,
    },
    scoring::Constituent,
};
use std::path::Path;
use std::sync::Arc;

/// How prices are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PriceMode {
    /// Yahoo Finance behind the SQLite cache
    Cached,
    /// Yahoo Finance on every request
    Live,
    /// No market data at all
    Offline,
}

impl PriceMode {
    pub(crate) const fn from_flags(no_cache: bool, offline: bool) -> Self {
        if offline {
            Self::Offline
        } else if no_cache {
            Self::Live
        } else {
            Self::Cached
        }
    }
}

/// Price source for `mode`.
pub(crate) fn price_source(cfg: &AppConfig, mode: PriceMode) -> Result<Arc<dyn PriceSource>, DataError> {
    Ok(match mode {
        PriceMode::Offline => Arc::new(StaticPriceSource::default()),
        PriceMode::Live => Arc::new(YahooPriceSource::new()?),
        PriceMode::Cached => {
            let cache = cache_manager::open_cache(cfg.cache_path.as_deref())?;
            Arc::new(CachedPriceSource::new(YahooPriceSource::new()?, Arc::new(cache)))
        }
    })
}

/// Screener over `prices` with the configured settings and text generator.
pub(crate) fn screener(cfg: &AppConfig, prices: Arc<dyn PriceSource>) -> anyhow::Result<RegionScreener> {
    let settings = ScreenSettings {
        lookback_days: cfg.lookback_days,
        top_n: cfg.top_n,
        score_weights: cfg.score_weights,
        ..ScreenSettings::default()
    };
    Ok(RegionScreener::new(
        prices,
        Arc::new(NoFundamentals),
        Arc::new(NoNews),
        cfg.text_generator()?,
    )
    .with_settings(settings))
}

/// Upper-case, trimmed, de-duplicated region codes in input order.
pub(crate) fn normalize_regions(regions: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for region in regions.iter().map(|r| r.trim().to_uppercase()) {
        if !region.is_empty() && !out.contains(&region) {
            out.push(region);
        }
    }
    out
}

/// Universe members per region. A region whose file cannot be read gets an
/// empty list and is screened over dummy features.
pub(crate) fn load_universes(dir: &Path, regions: &[String]) -> Vec<(String, Vec<Constituent>)> {
    regions
        .iter()
        .map(|region| match RegionUniverse::load(dir, region) {
            Ok(universe) => (region.clone(), universe.constituents().to_vec()),
            Err(e) => {
                tracing::warn!(%region, error = %e, "universe unavailable");
                (region.clone(), Vec::new())
            }
        })
        .collect()
}

/// Outer join of the non-empty panels, `None` when all are empty.
pub(crate) fn merge_panels<'a>(panels: impl IntoIterator<Item = &'a PricePanel>) -> Option<PricePanel> {
    panels
        .into_iter()
        .filter(|p| !p.is_empty())
        .fold(None, |acc: Option<PricePanel>, panel| {
            Some(match acc {
                Some(merged) => merged.outer_join(panel),
                None => panel.clone(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn panel(ticker: &str, days: &[u32]) -> PricePanel {
        let dates = days
            .iter()
            .map(|d| NaiveDate::from_ymd_opt(2024, 6, *d).unwrap())
            .collect();
        let values = closes(days.len());
        PricePanel::from_columns(dates, vec![(ticker.to_string(), values)]).unwrap()
    }

    fn closes(n: usize) -> Vec<Option<f64>> {
        (0..n).map(|i| Some(100.0 + i as f64)).collect()
    }

    #[test]
    fn test_price_mode_flags() {
        assert_eq!(PriceMode::from_flags(false, false), PriceMode::Cached);
        assert_eq!(PriceMode::from_flags(true, false), PriceMode::Live);
        assert_eq!(PriceMode::from_flags(true, true), PriceMode::Offline);
    }

    #[test]
    fn test_normalize_regions() {
        let regions = vec![" jp".to_string(), "US".to_string(), "".to_string(), "Jp".to_string()];
        assert_eq!(normalize_regions(&regions), vec!["JP", "US"]);
    }

    #[test]
    fn test_merge_panels_skips_empty() {
        let us = panel("AAPL", &[3, 4]);
        let jp = panel("7203.T", &[4, 5]);
        let empty = PricePanel::empty();

        assert!(merge_panels([&empty]).is_none());
        let merged = merge_panels([&us, &empty, &jp]).unwrap();
        assert_eq!(merged.n_dates(), 3);
        assert_eq!(merged.tickers(), &["AAPL".to_string(), "7203.T".to_string()]);
    }

    #[test]
    fn test_missing_universe_is_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("US.csv"), "ticker,name\nAAPL,Apple\n").unwrap();

        let universes = load_universes(dir.path(), &["US".to_string(), "CN".to_string()]);
        assert_eq!(universes[0].1.len(), 1);
        assert!(universes[1].1.is_empty());
    }
}
