//! Per-region candidate screening.
//!
//! Prices, fundamentals and news are fetched through injected sources, turned
//! into a feature table, normalized, scored and ranked. A region whose prices
//! cannot be fetched is screened over deterministic dummy features instead.

use crate::error::Result;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use hobart_data::{
    FundamentalsSource, NewsSource, PriceHistory, PricePanel, PriceSource, TextGenerator,
};
use hobart_scoring::{
    Candidate, Constituent, DUMMY_SIZE, FUNDAMENTAL_FIELDS, RankBy, RegionCandidates, ScoreWeights,
    dummy_features, features_from_prices, merge_fundamentals, merge_news_signal,
    normalize_features, rank_candidates, score_features,
};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::sync::Arc;

const ANALYST_PROMPT: &str = "You are an equity analyst. Answer briefly and factually and avoid speculation.";

/// Risks attached when no generated text is available.
pub const DEFAULT_RISKS: [&str; 3] = ["Supply and demand shifts", "Regulation", "Macro factors"];

/// Most risks kept from generated text.
const MAX_RISKS: usize = 3;

/// Screening knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSettings {
    /// Price history window in calendar days
    pub lookback_days: u32,
    /// News window in calendar days
    pub news_lookback_days: u32,
    /// Candidates kept per ranking
    pub top_n: usize,
    /// Thesis requests in flight at once
    pub thesis_concurrency: usize,
    /// Sub-score weights
    pub score_weights: ScoreWeights,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            lookback_days: 260,
            news_lookback_days: 7,
            top_n: 50,
            thesis_concurrency: 4,
            score_weights: ScoreWeights::default(),
        }
    }
}

/// Result of screening one region.
#[derive(Debug, Clone)]
pub struct ScreenOutcome {
    /// Ranked candidates
    pub candidates: RegionCandidates,
    /// Closes fetched for the region; empty when dummy features were used
    pub prices: PricePanel,
    /// Whether dummy features stood in for market data
    pub used_dummy_features: bool,
}

/// Screens regional universes into ranked candidates.
#[derive(Clone)]
pub struct RegionScreener {
    prices: Arc<dyn PriceSource>,
    fundamentals: Arc<dyn FundamentalsSource>,
    news: Arc<dyn NewsSource>,
    text: Arc<dyn TextGenerator>,
    settings: ScreenSettings,
}

impl std::fmt::Debug for RegionScreener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionScreener")
            .field("text", &self.text)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RegionScreener {
    /// Create a screener over the given sources.
    pub fn new(
        prices: Arc<dyn PriceSource>,
        fundamentals: Arc<dyn FundamentalsSource>,
        news: Arc<dyn NewsSource>,
        text: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            prices,
            fundamentals,
            news,
            text,
            settings: ScreenSettings::default(),
        }
    }

    /// Replace the screening settings.
    pub const fn with_settings(mut self, settings: ScreenSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Screen one region.
    ///
    /// An empty universe, a failed price fetch or a universe without any prices
    /// falls back to [`dummy_features`]. Fundamentals and news failures are
    /// logged and leave the neutral defaults in place.
    pub async fn screen(&self, region: &str, universe: &[Constituent], as_of: NaiveDate) -> Result<ScreenOutcome> {
        let (features, prices) = match self.market_features(region, universe).await {
            Some((features, history)) => (features, Some(history.prices)),
            None => {
                tracing::info!(region, "screening dummy features");
                (dummy_features(region, as_of, DUMMY_SIZE)?, None)
            }
        };

        let scored = score_features(&normalize_features(&features)?, &self.settings.score_weights)?;
        let mut top = rank_candidates(&scored, region, self.settings.top_n, RankBy::Overall)?;
        let mut growth = rank_candidates(&scored, region, self.settings.top_n, RankBy::Growth)?;
        self.attach_theses(region, &mut top, &mut growth).await;

        tracing::info!(region, candidates = top.len(), dummy = prices.is_none(), "region screened");
        let mut candidates = RegionCandidates::new(region, as_of.format("%Y-%m-%d").to_string(), top);
        candidates.growth_candidates = growth;

        Ok(ScreenOutcome {
            candidates,
            used_dummy_features: prices.is_none(),
            prices: prices.unwrap_or_else(PricePanel::empty),
        })
    }

    /// Screen several regions, at most `concurrency` at a time, keeping input order.
    pub async fn screen_all(
        &self,
        universes: Vec<(String, Vec<Constituent>)>,
        as_of: NaiveDate,
        concurrency: usize,
    ) -> Vec<(String, Result<ScreenOutcome>)> {
        stream::iter(universes)
            .map(|(region, universe)| async move {
                let outcome = self.screen(&region, &universe, as_of).await;
                (region, outcome)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn market_features(&self, region: &str, universe: &[Constituent]) -> Option<(DataFrame, PriceHistory)> {
        if universe.is_empty() {
            return None;
        }
        let tickers: Vec<String> = universe.iter().map(|c| c.ticker.clone()).collect();

        let history = match self.prices.price_history(&tickers, self.settings.lookback_days).await {
            Ok(history) if !history.is_empty() => history,
            Ok(_) => {
                tracing::warn!(region, "no prices returned");
                return None;
            }
            Err(e) => {
                tracing::warn!(region, error = %e, "price fetch failed");
                return None;
            }
        };

        let mut features = match features_from_prices(universe, &history) {
            Ok(df) if df.height() > 0 => df,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(region, error = %e, "price features failed");
                return None;
            }
        };

        match self.fundamentals.fundamentals(&tickers, &FUNDAMENTAL_FIELDS).await {
            Ok(table) => match merge_fundamentals(&features, &table) {
                Ok(merged) => features = merged,
                Err(e) => tracing::warn!(region, error = %e, "fundamentals merge failed"),
            },
            Err(e) => tracing::warn!(region, error = %e, "fundamentals fetch failed"),
        }

        match self.news.news(&tickers, self.settings.news_lookback_days).await {
            Ok(items) => match merge_news_signal(&features, &items) {
                Ok(merged) => features = merged,
                Err(e) => tracing::warn!(region, error = %e, "news merge failed"),
            },
            Err(e) => tracing::warn!(region, error = %e, "news fetch failed"),
        }

        Some((features, history))
    }

    async fn attach_theses(&self, region: &str, top: &mut [Candidate], growth: &mut [Candidate]) {
        let mut unique: Vec<&Candidate> = Vec::new();
        for c in top.iter().chain(growth.iter()) {
            if !unique.iter().any(|u| u.ticker == c.ticker) {
                unique.push(c);
            }
        }

        let theses: HashMap<String, (String, Vec<String>)> = stream::iter(unique)
            .map(|c| async move { (c.ticker.clone(), self.thesis(region, c).await) })
            .buffered(self.settings.thesis_concurrency.max(1))
            .collect()
            .await;

        for c in top.iter_mut().chain(growth.iter_mut()) {
            if let Some((thesis, risks)) = theses.get(&c.ticker) {
                c.thesis = thesis.clone();
                c.risks = risks.clone();
            }
        }
    }

    async fn thesis(&self, region: &str, c: &Candidate) -> (String, Vec<String>) {
        if !self.text.is_available() {
            return template_thesis(region, c);
        }

        match self.text.generate(ANALYST_PROMPT, &thesis_prompt(region, c)).await {
            Ok(text) => parse_thesis(&text).unwrap_or_else(|| template_thesis(region, c)),
            Err(e) => {
                tracing::debug!(ticker = %c.ticker, error = %e, "thesis generation failed");
                template_thesis(region, c)
            }
        }
    }
}

fn display_name(c: &Candidate) -> &str {
    if c.name.is_empty() { &c.ticker } else { &c.name }
}

fn template_thesis(region: &str, c: &Candidate) -> (String, Vec<String>) {
    (
        format!("{} screens well relative to the {region} market.", display_name(c)),
        DEFAULT_RISKS.iter().map(|r| r.to_string()).collect(),
    )
}

fn thesis_prompt(region: &str, c: &Candidate) -> String {
    let b = &c.breakdown;
    format!(
        "Ticker: {}\nName: {}\nRegion: {region}\nFeatures (normalized 0..1):\n\
         - fundamental: {:.3}\n- technical: {:.3}\n- quality: {:.3}\n- news: {:.3}\n- growth: {:.3}\n\n\
         Write a one or two sentence investment thesis, then list up to three key risks as bullet points.",
        c.ticker,
        display_name(c),
        b.fundamental,
        b.technical,
        b.quality,
        b.news,
        b.growth,
    )
}

/// Split generated text into a thesis (first non-empty line) and up to three
/// risks (the following lines, bullet markers stripped).
///
/// Returns `None` for blank text. Default risks fill in when none follow.
pub fn parse_thesis(text: &str) -> Option<(String, Vec<String>)> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let thesis = lines.next()?.to_string();

    let mut risks: Vec<String> = lines
        .take(MAX_RISKS)
        .map(|l| l.trim_start_matches(['-', '・', '*', ' ']).to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if risks.is_empty() {
        risks = DEFAULT_RISKS.iter().map(|r| r.to_string()).collect();
    }
    Some((thesis, risks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Solid franchise.\n- Rates\n* FX\n・Competition\n- Extra", "Solid franchise.", vec!["Rates", "FX", "Competition"])]
    #[case("\n  Cheap on earnings.  \n\n", "Cheap on earnings.", DEFAULT_RISKS.to_vec())]
    fn test_parse_thesis(#[case] text: &str, #[case] thesis: &str, #[case] risks: Vec<&str>) {
        let (t, r) = parse_thesis(text).unwrap();
        assert_eq!(t, thesis);
        assert_eq!(r, risks);
    }

    #[test]
    fn test_blank_text_has_no_thesis() {
        assert!(parse_thesis(" \n\t\n").is_none());
    }

    #[test]
    fn test_template_uses_ticker_without_name() {
        let c = Candidate::new("7203.T", "JP", 0.7);
        let (thesis, risks) = template_thesis("JP", &c);
        assert_eq!(thesis, "7203.T screens well relative to the JP market.");
        assert_eq!(risks.len(), 3);
    }

    #[test]
    fn test_prompt_lists_breakdown() {
        let mut c = Candidate::new("AAPL", "US", 0.8);
        c.name = "Apple".into();
        c.breakdown.growth = 0.25;
        let prompt = thesis_prompt("US", &c);
        assert!(prompt.contains("Name: Apple"));
        assert!(prompt.contains("- growth: 0.250"));
    }
}
