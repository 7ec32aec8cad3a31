//! Keyword sentiment for news headlines.

const POSITIVE: &[&str] = &[
    "beat",
    "beats",
    "beat estimates",
    "surge",
    "rally",
    "jump",
    "record",
    "raise",
    "raises",
    "upgrade",
    "upgraded",
    "outperform",
    "strong",
    "growth",
    "accelerate",
    "accelerates",
    "expand",
    "expands",
];

const NEGATIVE: &[&str] = &[
    "miss",
    "misses",
    "miss estimates",
    "slump",
    "plunge",
    "drop",
    "falls",
    "fall",
    "cut",
    "cuts",
    "downgrade",
    "downgraded",
    "underperform",
    "weak",
    "lawsuit",
];

/// Matches needed for full-scale sentiment.
const SATURATION: f64 = 3.0;

/// Headline sentiment in `[-1, 1]`.
///
/// Every keyword contained in the lowercased title counts once, positive minus
/// negative, scaled so three net matches saturate.
pub fn title_sentiment(title: &str) -> f64 {
    if title.is_empty() {
        return 0.0;
    }
    let lower = title.to_lowercase();
    let hits = |words: &[&str]| words.iter().filter(|w| lower.contains(*w)).count() as f64;
    let net = hits(POSITIVE) - hits(NEGATIVE);
    (net / SATURATION).clamp(-1.0, 1.0)
}
