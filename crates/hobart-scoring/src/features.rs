//! Feature tables for candidate scoring.
//!
//! Tables are polars frames keyed by `ticker`. Missing values are nulls, never NaN.

use crate::{
    candidate::Constituent,
    error::{Result, ScoringError},
    normalize::{NEUTRAL, normalize_growth_rate},
    sentiment::title_sentiment,
};
use chrono::NaiveDate;
use hobart_data::{FundamentalsTable, NewsItem, PriceHistory};
use polars::prelude::*;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;

/// Ticker column
pub const TICKER: &str = "ticker";
/// Company name column
pub const NAME: &str = "name";
/// Columns that are never normalized
pub const IDENTITY_COLUMNS: [&str; 2] = [TICKER, NAME];

/// Return on invested capital
pub const FUNDAMENTAL_ROIC: &str = "fundamental_roic";
/// Free cash flow margin
pub const FUNDAMENTAL_FCF_MARGIN: &str = "fundamental_fcf_margin";
/// 252-day momentum
pub const TECHNICAL_MOM_12M: &str = "technical_mom_12m";
/// 126-day momentum
pub const TECHNICAL_MOM_6M: &str = "technical_mom_6m";
/// 63-day momentum
pub const TECHNICAL_MOM_3M: &str = "technical_mom_3m";
/// 21-day momentum
pub const TECHNICAL_MOM_1M: &str = "technical_mom_1m";
/// 10-day over 60-day mean volume
pub const TECHNICAL_VOLUME_TREND: &str = "technical_volume_trend";
/// Share dilution score
pub const QUALITY_DILUTION: &str = "quality_dilution";
/// News signal
pub const NEWS_SIGNAL: &str = "news_signal";
/// Normalized revenue CAGR
pub const GROWTH_REVENUE_CAGR: &str = "growth_revenue_cagr";
/// Normalized EPS growth
pub const GROWTH_EPS_GROWTH: &str = "growth_eps_growth";

/// Fields requested from a fundamentals source.
pub const FUNDAMENTAL_FIELDS: [&str; 4] = ["roic", "fcf_margin", "revenue_cagr", "eps_growth"];

/// Momentum windows in trading days, paired with their columns.
const MOMENTUM_WINDOWS: [(&str, usize); 4] = [
    (TECHNICAL_MOM_12M, 252),
    (TECHNICAL_MOM_6M, 126),
    (TECHNICAL_MOM_3M, 63),
    (TECHNICAL_MOM_1M, 21),
];

const SHORT_VOLUME_WINDOW: usize = 10;
const LONG_VOLUME_WINDOW: usize = 60;

/// Rows in a dummy feature table.
pub const DUMMY_SIZE: usize = 120;

/// Return over the last `days` observations, if the series is long enough.
pub fn momentum(closes: &[f64], days: usize) -> Option<f64> {
    let n = closes.len();
    if n <= days {
        return None;
    }
    let base = closes[n - days];
    if base == 0.0 {
        return None;
    }
    Some(closes[n - 1] / base - 1.0)
}

/// Ratio of the 10-day to the 60-day mean volume at the latest observation.
pub fn volume_trend(volumes: &[f64]) -> Option<f64> {
    let n = volumes.len();
    if n < LONG_VOLUME_WINDOW {
        return None;
    }
    let mean = |window: usize| volumes[n - window..].iter().sum::<f64>() / window as f64;
    let long = mean(LONG_VOLUME_WINDOW);
    if long == 0.0 {
        return None;
    }
    Some(mean(SHORT_VOLUME_WINDOW) / long)
}

fn finite_series(values: Option<ndarray::ArrayView1<'_, f64>>) -> Vec<f64> {
    values
        .map(|col| col.iter().copied().filter(|v| v.is_finite()).collect())
        .unwrap_or_default()
}

fn f64_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Series::new(name.into(), values).into()
}

fn constant_column(name: &str, value: f64, len: usize) -> Column {
    f64_column(name, vec![Some(value); len])
}

/// A feature table with no rows and the full price-derived schema.
pub fn empty_features() -> Result<DataFrame> {
    build_price_frame(Vec::new(), Vec::new(), Vec::new(), Vec::new())
}

fn build_price_frame(
    tickers: Vec<String>,
    names: Vec<String>,
    momenta: Vec<[Option<f64>; 4]>,
    trends: Vec<Option<f64>>,
) -> Result<DataFrame> {
    let n = tickers.len();
    let mut columns: Vec<Column> = vec![
        Series::new(TICKER.into(), tickers).into(),
        Series::new(NAME.into(), names).into(),
        constant_column(FUNDAMENTAL_ROIC, NEUTRAL, n),
        constant_column(FUNDAMENTAL_FCF_MARGIN, NEUTRAL, n),
    ];
    for (k, (column, _)) in MOMENTUM_WINDOWS.iter().enumerate() {
        columns.push(f64_column(column, momenta.iter().map(|m| m[k]).collect()));
    }
    columns.push(f64_column(TECHNICAL_VOLUME_TREND, trends));
    columns.push(constant_column(QUALITY_DILUTION, NEUTRAL, n));
    columns.push(constant_column(NEWS_SIGNAL, NEUTRAL, n));

    Ok(DataFrame::new(columns)?)
}

/// Technical features from price and volume history.
///
/// Only universe members with at least one price are included, in universe order.
/// Fundamental, quality and news columns start at [`NEUTRAL`] and are filled in by
/// [`merge_fundamentals`] and [`merge_news_signal`].
pub fn features_from_prices(universe: &[Constituent], history: &PriceHistory) -> Result<DataFrame> {
    let mut tickers = Vec::new();
    let mut names = Vec::new();
    let mut momenta = Vec::new();
    let mut trends = Vec::new();

    for member in universe {
        let closes = finite_series(history.prices.column(&member.ticker));
        if closes.is_empty() {
            continue;
        }
        let volumes = finite_series(history.volumes.column(&member.ticker));

        let mut row = [None; 4];
        for (slot, (_, days)) in row.iter_mut().zip(MOMENTUM_WINDOWS) {
            *slot = momentum(&closes, days);
        }

        tickers.push(member.ticker.clone());
        names.push(member.name.clone());
        momenta.push(row);
        trends.push(volume_trend(&volumes));
    }

    build_price_frame(tickers, names, momenta, trends)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

/// Seed for the dummy feature generator.
pub fn dummy_seed(region: &str, as_of: NaiveDate) -> u64 {
    fnv1a(format!("{region}|{as_of}").as_bytes())
}

/// Deterministic placeholder features for a region without price data.
///
/// Tickers are `{region}000`, `{region}001`, … and every draw is clipped to `[0, 1]`.
/// The same region and date always give the same table.
pub fn dummy_features(region: &str, as_of: NaiveDate, size: usize) -> Result<DataFrame> {
    let mut rng = StdRng::seed_from_u64(dummy_seed(region, as_of));
    let specs: [(&str, f64, f64); 6] = [
        (FUNDAMENTAL_ROIC, 0.2, 0.05),
        (FUNDAMENTAL_FCF_MARGIN, 0.15, 0.05),
        (TECHNICAL_MOM_12M, 0.5, 0.2),
        (TECHNICAL_VOLUME_TREND, 0.5, 0.2),
        (QUALITY_DILUTION, 0.6, 0.15),
        (NEWS_SIGNAL, 0.5, 0.2),
    ];

    let mut columns: Vec<Column> = vec![
        Series::new(TICKER.into(), (0..size).map(|i| format!("{region}{i:03}")).collect::<Vec<_>>()).into(),
        Series::new(
            NAME.into(),
            (0..size).map(|i| format!("{region}-Company-{i:03}")).collect::<Vec<_>>(),
        )
        .into(),
    ];
    for (column, mean, std_dev) in specs {
        let normal =
            Normal::new(mean, std_dev).map_err(|e| ScoringError::Distribution(e.to_string()))?;
        let draws: Vec<f64> = (0..size)
            .map(|_| normal.sample(&mut rng).clamp(0.0, 1.0))
            .collect();
        columns.push(Series::new(column.into(), draws).into());
    }

    Ok(DataFrame::new(columns)?)
}

/// Tickers of a feature table, in row order.
pub fn tickers(df: &DataFrame) -> Result<Vec<String>> {
    let column = df
        .column(TICKER)
        .map_err(|_| ScoringError::MissingColumn(TICKER.to_string()))?;
    Ok(column
        .str()?
        .into_iter()
        .map(|t| t.unwrap_or_default().to_string())
        .collect())
}

/// Values of a numeric column, `None` when the column is absent.
pub fn float_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let column = column.cast(&DataType::Float64)?;
    Ok(Some(column.f64()?.into_iter().collect()))
}

/// Overlay fundamentals on a feature table.
///
/// Known `roic` and `fcf_margin` values replace the neutral placeholders. When the
/// table carries `revenue_cagr` or `eps_growth` for any ticker, the matching growth
/// column is added with rates mapped through [`normalize_growth_rate`].
pub fn merge_fundamentals(df: &DataFrame, fundamentals: &FundamentalsTable) -> Result<DataFrame> {
    let tickers = tickers(df)?;
    let mut out = df.clone();

    for (field, column) in [("roic", FUNDAMENTAL_ROIC), ("fcf_margin", FUNDAMENTAL_FCF_MARGIN)] {
        let existing = float_column(df, column)?.unwrap_or_else(|| vec![None; tickers.len()]);
        let merged: Vec<Option<f64>> = tickers
            .iter()
            .zip(existing)
            .map(|(t, current)| fundamentals.get(t, field).or(current))
            .collect();
        out.with_column(Series::new(column.into(), merged))?;
    }

    for (field, column) in [("revenue_cagr", GROWTH_REVENUE_CAGR), ("eps_growth", GROWTH_EPS_GROWTH)] {
        if !tickers.iter().any(|t| fundamentals.get(t, field).is_some()) {
            continue;
        }
        let growth: Vec<f64> = tickers
            .iter()
            .map(|t| normalize_growth_rate(fundamentals.get(t, field)))
            .collect();
        out.with_column(Series::new(column.into(), growth))?;
    }

    Ok(out)
}

/// Derive `news_signal` from headlines.
///
/// When any headline carries keyword sentiment, each ticker gets its mean headline
/// sentiment mapped from `[-1, 1]` into `[0, 1]`; tickers without news land at 0.5.
/// Otherwise headline counts are scaled by the busiest ticker. No headlines leaves
/// the table unchanged.
pub fn merge_news_signal(df: &DataFrame, news: &[NewsItem]) -> Result<DataFrame> {
    if news.is_empty() {
        return Ok(df.clone());
    }
    let tickers = tickers(df)?;
    let scored: Vec<(&str, f64)> = news
        .iter()
        .map(|item| (item.ticker.as_str(), title_sentiment(&item.title)))
        .collect();

    let signal: Vec<f64> = if scored.iter().any(|(_, s)| s.abs() > 1e-9) {
        tracing::debug!(items = news.len(), "news signal from headline sentiment");
        let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
        for (ticker, s) in &scored {
            let entry = sums.entry(ticker).or_insert((0.0, 0));
            entry.0 += s;
            entry.1 += 1;
        }
        tickers
            .iter()
            .map(|t| {
                let mean = sums.get(t.as_str()).map_or(0.0, |(sum, n)| sum / *n as f64);
                ((mean + 1.0) / 2.0).clamp(0.0, 1.0)
            })
            .collect()
    } else {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (ticker, _) in &scored {
            *counts.entry(ticker).or_insert(0) += 1;
        }
        let per_row: Vec<usize> = tickers
            .iter()
            .map(|t| counts.get(t.as_str()).copied().unwrap_or(0))
            .collect();
        let busiest = per_row.iter().copied().max().unwrap_or(0);
        if busiest == 0 {
            return Ok(df.clone());
        }
        tracing::debug!(items = news.len(), "news signal from headline counts");
        per_row.iter().map(|&c| c as f64 / busiest as f64).collect()
    };

    let mut out = df.clone();
    out.with_column(Series::new(NEWS_SIGNAL.into(), signal))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hobart_data::PricePanel;
    use ndarray::Array2;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..n as u64).map(|i| start + chrono::Days::new(i)).collect()
    }

    fn frame(tickers: &[&str]) -> DataFrame {
        let n = tickers.len();
        DataFrame::new(vec![
            Series::new(TICKER.into(), tickers).into(),
            Series::new(NAME.into(), tickers).into(),
            constant_column(FUNDAMENTAL_ROIC, 0.5, n),
            constant_column(FUNDAMENTAL_FCF_MARGIN, 0.5, n),
            constant_column(NEWS_SIGNAL, 0.5, n),
        ])
        .unwrap()
    }

    fn news(ticker: &str, title: &str) -> NewsItem {
        NewsItem {
            ticker: ticker.to_string(),
            title: title.to_string(),
            published_at: None,
        }
    }

    #[test]
    fn test_momentum_and_volume_trend() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        // closes[30 - 21] = 109
        assert_relative_eq!(momentum(&closes, 21).unwrap(), 129.0 / 109.0 - 1.0);
        assert_eq!(momentum(&closes, 30), None);
        assert_eq!(momentum(&[0.0, 1.0, 2.0], 2), Some(1.0));
        assert_eq!(momentum(&[0.0, 1.0, 2.0], 3), None);

        let mut volumes = vec![100.0; 50];
        volumes.extend(vec![200.0; 10]);
        // 10-day mean 200, 60-day mean 7000 / 60
        assert_relative_eq!(volume_trend(&volumes).unwrap(), 200.0 / (7000.0 / 60.0));
        assert_eq!(volume_trend(&volumes[1..]), None);
        assert_eq!(volume_trend(&[0.0; 60]), None);
    }

    #[test]
    fn test_features_from_prices_skips_missing_tickers() {
        let n = 30;
        let prices = PricePanel::new(
            dates(n),
            vec!["AAA".into(), "BBB".into()],
            Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { 10.0 + i as f64 } else { f64::NAN }),
        )
        .unwrap();
        let history = PriceHistory {
            prices,
            volumes: PricePanel::empty(),
        };
        let universe = vec![
            Constituent::new("AAA", "Alpha"),
            Constituent::new("BBB", "Beta"),
            Constituent::new("CCC", "Gamma"),
        ];

        let df = features_from_prices(&universe, &history).unwrap();
        assert_eq!(tickers(&df).unwrap(), vec!["AAA".to_string()]);
        let mom_1m = float_column(&df, TECHNICAL_MOM_1M).unwrap().unwrap();
        assert_relative_eq!(mom_1m[0].unwrap(), 39.0 / 19.0 - 1.0);
        assert_eq!(float_column(&df, TECHNICAL_MOM_12M).unwrap().unwrap(), vec![None]);
        assert_eq!(float_column(&df, TECHNICAL_VOLUME_TREND).unwrap().unwrap(), vec![None]);
        assert_eq!(float_column(&df, QUALITY_DILUTION).unwrap().unwrap(), vec![Some(0.5)]);
    }

    #[test]
    fn test_empty_features_has_schema() {
        let df = empty_features().unwrap();
        assert_eq!(df.height(), 0);
        assert!(df.column(TECHNICAL_VOLUME_TREND).is_ok());
        assert!(df.column(NEWS_SIGNAL).is_ok());
    }

    #[test]
    fn test_dummy_features_are_deterministic() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        let a = dummy_features("JP", as_of, DUMMY_SIZE).unwrap();
        let b = dummy_features("JP", as_of, DUMMY_SIZE).unwrap();
        let c = dummy_features("US", as_of, DUMMY_SIZE).unwrap();

        assert_eq!(a.height(), DUMMY_SIZE);
        assert!(a.equals(&b));
        assert_eq!(tickers(&a).unwrap()[7], "JP007");
        assert_ne!(
            float_column(&a, FUNDAMENTAL_ROIC).unwrap().unwrap(),
            float_column(&c, FUNDAMENTAL_ROIC).unwrap().unwrap()
        );
        for v in float_column(&a, QUALITY_DILUTION).unwrap().unwrap() {
            let v = v.unwrap();
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_merge_fundamentals_overrides_and_adds_growth() {
        let mut table = FundamentalsTable::new();
        table.insert("A", "roic", 0.2);
        table.insert("A", "fcf_margin", 0.1);
        table.insert("A", "revenue_cagr", 0.3);

        let out = merge_fundamentals(&frame(&["A", "B"]), &table).unwrap();
        assert_eq!(
            float_column(&out, FUNDAMENTAL_ROIC).unwrap().unwrap(),
            vec![Some(0.2), Some(0.5)]
        );
        assert_eq!(
            float_column(&out, FUNDAMENTAL_FCF_MARGIN).unwrap().unwrap(),
            vec![Some(0.1), Some(0.5)]
        );
        let growth = float_column(&out, GROWTH_REVENUE_CAGR).unwrap().unwrap();
        assert_relative_eq!(growth[0].unwrap(), 0.8);
        assert_relative_eq!(growth[1].unwrap(), 0.5);
        assert!(out.column(GROWTH_EPS_GROWTH).is_err());
    }

    #[test]
    fn test_news_counts_scale_to_unit_interval() {
        let items = vec![news("A", "t1"), news("A", "t2"), news("B", "t3")];
        let out = merge_news_signal(&frame(&["A", "B"]), &items).unwrap();
        assert_eq!(
            float_column(&out, NEWS_SIGNAL).unwrap().unwrap(),
            vec![Some(1.0), Some(0.5)]
        );
    }

    #[test]
    fn test_news_sentiment_preferred_over_counts() {
        let items = vec![
            news("A", "Earnings beat and raises guidance"),
            news("A", "Upgrade to outperform"),
            news("B", "Quarterly filing"),
        ];
        let out = merge_news_signal(&frame(&["A", "B", "C"]), &items).unwrap();
        let signal = float_column(&out, NEWS_SIGNAL).unwrap().unwrap();
        assert!(signal[0].unwrap() > 0.5);
        assert_relative_eq!(signal[1].unwrap(), 0.5);
        assert_relative_eq!(signal[2].unwrap(), 0.5);
    }

    #[test]
    fn test_news_for_unknown_tickers_leaves_table() {
        let items = vec![news("Z", "t1")];
        let df = frame(&["A"]);
        let out = merge_news_signal(&df, &items).unwrap();
        assert!(out.equals(&df));
    }
}
