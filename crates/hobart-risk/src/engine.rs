//! Risk metrics over merged regional price panels.

use crate::{
    metrics::{RiskMetrics, TRADING_DAYS},
    returns::{ReturnsMethod, compute_returns},
};
use hobart_data::PricePanel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for the risk engine
#[derive(Debug, Clone, Copy)]
pub struct RiskEngineConfig {
    /// Periods per year used to annualize
    pub periods_per_year: f64,
    /// Return definition
    pub method: ReturnsMethod,
}

impl Default for RiskEngineConfig {
    fn default() -> Self {
        Self {
            periods_per_year: TRADING_DAYS,
            method: ReturnsMethod::Pct,
        }
    }
}

/// Output of one risk run: `{"metrics": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    /// Metrics keyed by ticker; empty when no data was available
    pub metrics: RiskMetrics,
}

/// Stateless risk metrics engine.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    config: RiskEngineConfig,
}

impl RiskEngine {
    /// Create an engine with `config`.
    pub const fn new(config: RiskEngineConfig) -> Self {
        Self { config }
    }

    /// Merge the regional panels on date and compute metrics.
    ///
    /// Regions whose prices could not be fetched map to `None`; they and
    /// empty panels are skipped.
    pub fn run(&self, panels: &BTreeMap<String, Option<PricePanel>>) -> RiskReport {
        let mut merged: Option<PricePanel> = None;
        for (region, panel) in panels {
            let Some(panel) = panel.as_ref().filter(|p| !p.is_empty()) else {
                tracing::debug!(%region, "no prices for region, skipping");
                continue;
            };
            merged = Some(match merged {
                Some(acc) => acc.outer_join(panel),
                None => panel.clone(),
            });
        }

        let Some(merged) = merged else {
            tracing::info!("no price data for risk metrics");
            return RiskReport::default();
        };

        let returns = compute_returns(&merged, self.config.method);
        tracing::debug!(
            tickers = returns.tickers().len(),
            periods = returns.n_periods(),
            "computing risk metrics"
        );

        RiskReport {
            metrics: RiskMetrics::from_returns(&returns, self.config.periods_per_year),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn regions(entries: Vec<(&str, Option<PricePanel>)>) -> BTreeMap<String, Option<PricePanel>> {
        entries.into_iter().map(|(r, p)| (r.to_string(), p)).collect()
    }

    #[test]
    fn test_no_panels_gives_empty_report() {
        let engine = RiskEngine::default();
        let report = engine.run(&regions(vec![("US", Some(PricePanel::empty())), ("JP", None)]));
        assert!(report.metrics.is_empty());
        assert_eq!(serde_json::to_string(&report).unwrap(), r#"{"metrics":{}}"#);
    }

    #[test]
    fn test_regions_are_merged_on_date() {
        let us = PricePanel::new(
            vec![day(1), day(2), day(3), day(6)],
            vec!["AAPL".into()],
            array![[100.0], [102.0], [101.0], [103.0]],
        )
        .unwrap();
        let jp = PricePanel::new(
            vec![day(2), day(3), day(6), day(7)],
            vec!["7203.T".into()],
            array![[2000.0], [2010.0], [1990.0], [2050.0]],
        )
        .unwrap();

        let report = RiskEngine::default().run(&regions(vec![
            ("US", Some(us)),
            ("EU", Some(PricePanel::empty())),
            ("JP", Some(jp)),
        ]));
        let metrics = report.metrics;

        assert_eq!(metrics.volatility.len(), 2);
        assert_eq!(metrics.correlation["AAPL"]["AAPL"], 1.0);
        assert_eq!(metrics.correlation["7203.T"]["7203.T"], 1.0);
        assert!(metrics.covariance["AAPL"].contains_key("7203.T"));
    }

    #[test]
    fn test_failed_region_is_skipped() {
        let us = PricePanel::new(
            vec![day(1), day(2), day(3)],
            vec!["AAPL".into(), "MSFT".into()],
            array![[100.0, 300.0], [102.0, 303.0], [101.0, 306.0]],
        )
        .unwrap();

        let report = RiskEngine::default().run(&regions(vec![("US", Some(us)), ("CN", None)]));
        let tickers: Vec<&String> = report.metrics.volatility.keys().collect();
        assert_eq!(tickers, ["AAPL", "MSFT"]);
    }
}
