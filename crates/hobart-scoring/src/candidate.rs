//! Candidate records.

use serde::{Deserialize, Serialize};

/// A universe member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constituent {
    /// Ticker symbol
    pub ticker: String,
    /// Company name
    pub name: String,
}

impl Constituent {
    /// Create a new constituent.
    pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
        }
    }
}

/// Sub-scores behind a candidate's overall score, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Mean of normalized ROIC and FCF margin
    pub fundamental: f64,
    /// Mean of normalized 12-month momentum and volume trend
    pub technical: f64,
    /// Normalized dilution score
    pub quality: f64,
    /// Normalized news signal
    pub news: f64,
    /// Mean of the growth columns, 0.5 when none are available
    pub growth: f64,
}

/// A scored stock proposed by a region screener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Ticker symbol
    pub ticker: String,
    /// Region code
    pub region: String,
    /// Overall score
    #[serde(rename = "score_overall")]
    pub score: f64,
    /// Company name
    #[serde(default)]
    pub name: String,
    /// Sub-scores
    #[serde(default, rename = "score_breakdown")]
    pub breakdown: ScoreBreakdown,
    /// One or two sentence investment thesis
    #[serde(default)]
    pub thesis: String,
    /// Up to three key risks
    #[serde(default)]
    pub risks: Vec<String>,
}

impl Candidate {
    /// A bare candidate with only ticker, region and score.
    pub fn new(ticker: impl Into<String>, region: impl Into<String>, score: f64) -> Self {
        Self {
            ticker: ticker.into(),
            region: region.into(),
            score,
            name: String::new(),
            breakdown: ScoreBreakdown::default(),
            thesis: String::new(),
            risks: Vec::new(),
        }
    }
}

/// Ranked candidates for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCandidates {
    /// Region code
    pub region: String,
    /// Screening date, `YYYY-MM-DD`
    pub as_of: String,
    /// Candidates by overall score, best first
    pub candidates: Vec<Candidate>,
    /// Candidates by growth score, best first
    #[serde(default)]
    pub growth_candidates: Vec<Candidate>,
}

impl RegionCandidates {
    /// Region blob with the given ranked candidates.
    pub fn new(region: impl Into<String>, as_of: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            region: region.into(),
            as_of: as_of.into(),
            candidates,
            growth_candidates: Vec::new(),
        }
    }
}
