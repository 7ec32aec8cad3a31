//! Score composition and ranking.

use crate::{
    candidate::{Candidate, ScoreBreakdown},
    error::{Result, ScoringError},
    features::{
        FUNDAMENTAL_FCF_MARGIN, FUNDAMENTAL_ROIC, GROWTH_EPS_GROWTH, GROWTH_REVENUE_CAGR, NAME,
        NEWS_SIGNAL, QUALITY_DILUTION, TECHNICAL_MOM_12M, TECHNICAL_VOLUME_TREND, float_column,
        tickers,
    },
    normalize::NEUTRAL,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Fundamental sub-score column
pub const SCORE_FUNDAMENTAL: &str = "score_fundamental";
/// Technical sub-score column
pub const SCORE_TECHNICAL: &str = "score_technical";
/// Quality sub-score column
pub const SCORE_QUALITY: &str = "score_quality";
/// News sub-score column
pub const SCORE_NEWS: &str = "score_news";
/// Growth sub-score column
pub const SCORE_GROWTH: &str = "score_growth";
/// Overall score column
pub const SCORE_OVERALL: &str = "score_overall";

/// Weights of the sub-scores in the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Fundamental weight
    pub fundamental: f64,
    /// Technical weight
    pub technical: f64,
    /// Quality weight
    pub quality: f64,
    /// News weight
    pub news: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            fundamental: 0.4,
            technical: 0.35,
            quality: 0.15,
            news: 0.10,
        }
    }
}

fn mean_of(columns: &[&str]) -> Expr {
    let n = columns.len() as f64;
    columns
        .iter()
        .map(|c| col(*c))
        .reduce(|acc, e| acc + e)
        .map_or_else(|| lit(NEUTRAL), |sum| sum / lit(n))
}

fn require(df: &DataFrame, columns: &[&str]) -> Result<()> {
    match columns.iter().find(|c| df.column(c).is_err()) {
        Some(missing) => Err(ScoringError::MissingColumn((*missing).to_string())),
        None => Ok(()),
    }
}

/// Add sub-scores and the overall score to a normalized feature table.
///
/// The growth sub-score averages whichever growth columns exist and is
/// [`NEUTRAL`] when there are none. It does not enter the overall score.
pub fn score_features(df: &DataFrame, weights: &ScoreWeights) -> Result<DataFrame> {
    require(
        df,
        &[
            FUNDAMENTAL_ROIC,
            FUNDAMENTAL_FCF_MARGIN,
            TECHNICAL_MOM_12M,
            TECHNICAL_VOLUME_TREND,
            QUALITY_DILUTION,
            NEWS_SIGNAL,
        ],
    )?;

    let growth: Vec<&str> = [GROWTH_REVENUE_CAGR, GROWTH_EPS_GROWTH]
        .into_iter()
        .filter(|c| df.column(c).is_ok())
        .collect();

    let scored = df
        .clone()
        .lazy()
        .with_columns([
            mean_of(&[FUNDAMENTAL_ROIC, FUNDAMENTAL_FCF_MARGIN]).alias(SCORE_FUNDAMENTAL),
            mean_of(&[TECHNICAL_MOM_12M, TECHNICAL_VOLUME_TREND]).alias(SCORE_TECHNICAL),
            col(QUALITY_DILUTION).alias(SCORE_QUALITY),
            col(NEWS_SIGNAL).alias(SCORE_NEWS),
            mean_of(&growth).alias(SCORE_GROWTH),
        ])
        .with_column(
            (lit(weights.fundamental) * col(SCORE_FUNDAMENTAL)
                + lit(weights.technical) * col(SCORE_TECHNICAL)
                + lit(weights.quality) * col(SCORE_QUALITY)
                + lit(weights.news) * col(SCORE_NEWS))
            .alias(SCORE_OVERALL),
        )
        .collect()?;

    Ok(scored)
}

/// Which score orders a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankBy {
    /// Overall score
    #[default]
    Overall,
    /// Growth sub-score
    Growth,
}

fn scores(df: &DataFrame, column: &str) -> Result<Vec<f64>> {
    Ok(float_column(df, column)?
        .ok_or_else(|| ScoringError::MissingColumn(column.to_string()))?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect())
}

/// Turn a scored table into the `top_n` best candidates for `region`.
///
/// Ties keep table order. Thesis and risks are left empty for the caller to fill.
pub fn rank_candidates(df: &DataFrame, region: &str, top_n: usize, by: RankBy) -> Result<Vec<Candidate>> {
    let tickers = tickers(df)?;
    let names: Vec<String> = match df.column(NAME) {
        Ok(column) => column
            .str()?
            .into_iter()
            .map(|n| n.unwrap_or_default().to_string())
            .collect(),
        Err(_) => tickers.clone(),
    };

    let overall = scores(df, SCORE_OVERALL)?;
    let fundamental = scores(df, SCORE_FUNDAMENTAL)?;
    let technical = scores(df, SCORE_TECHNICAL)?;
    let quality = scores(df, SCORE_QUALITY)?;
    let news = scores(df, SCORE_NEWS)?;
    let growth = scores(df, SCORE_GROWTH)?;

    let key = match by {
        RankBy::Overall => &overall,
        RankBy::Growth => &growth,
    };
    let mut order: Vec<usize> = (0..tickers.len()).collect();
    order.sort_by(|&a, &b| key[b].partial_cmp(&key[a]).unwrap_or(Ordering::Equal));

    Ok(order
        .into_iter()
        .take(top_n)
        .map(|i| Candidate {
            ticker: tickers[i].clone(),
            region: region.to_string(),
            score: overall[i],
            name: names[i].clone(),
            breakdown: ScoreBreakdown {
                fundamental: fundamental[i],
                technical: technical[i],
                quality: quality[i],
                news: news[i],
                growth: growth[i],
            },
            thesis: String::new(),
            risks: Vec::new(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn features() -> DataFrame {
        df!(
            "ticker" => ["A", "B", "C"],
            "name" => ["Alpha", "Beta", "Gamma"],
            FUNDAMENTAL_ROIC => [0.2, 0.8, 0.8],
            FUNDAMENTAL_FCF_MARGIN => [0.4, 0.6, 0.6],
            TECHNICAL_MOM_12M => [0.5, 0.6, 0.6],
            TECHNICAL_VOLUME_TREND => [0.4, 0.5, 0.5],
            QUALITY_DILUTION => [0.6, 0.4, 0.4],
            NEWS_SIGNAL => [0.5, 0.5, 0.5]
        )
        .unwrap()
    }

    #[test]
    fn test_score_without_growth_columns() {
        let scored = score_features(&features(), &ScoreWeights::default()).unwrap();
        let overall = scores(&scored, SCORE_OVERALL).unwrap();
        let growth = scores(&scored, SCORE_GROWTH).unwrap();

        // 0.4 * 0.3 + 0.35 * 0.45 + 0.15 * 0.6 + 0.1 * 0.5
        assert_relative_eq!(overall[0], 0.4175, epsilon = 1e-12);
        assert_eq!(growth, vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_missing_feature_column_is_an_error() {
        let df = features().drop(NEWS_SIGNAL).unwrap();
        assert!(matches!(
            score_features(&df, &ScoreWeights::default()),
            Err(ScoringError::MissingColumn(c)) if c == NEWS_SIGNAL
        ));
    }

    #[test]
    fn test_ranking_is_stable_and_truncated() {
        let scored = score_features(&features(), &ScoreWeights::default()).unwrap();
        let ranked = rank_candidates(&scored, "US", 2, RankBy::Overall).unwrap();

        let tickers: Vec<&str> = ranked.iter().map(|c| c.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["B", "C"]);
        assert_eq!(ranked[0].name, "Beta");
        assert_eq!(ranked[0].region, "US");
        assert_relative_eq!(ranked[0].breakdown.fundamental, 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_growth_ranking() {
        let mut df = features();
        df.with_column(Series::new(GROWTH_REVENUE_CAGR.into(), [0.9, 0.1, 0.5]))
            .unwrap();
        let scored = score_features(&df, &ScoreWeights::default()).unwrap();
        let ranked = rank_candidates(&scored, "JP", 3, RankBy::Growth).unwrap();

        let tickers: Vec<&str> = ranked.iter().map(|c| c.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["A", "C", "B"]);
        assert_relative_eq!(ranked[0].breakdown.growth, 0.9);
    }
}
