#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod candidate;
pub mod error;
pub mod features;
pub mod normalize;
pub mod score;
pub mod sentiment;
pub mod signals;

pub use candidate::{Candidate, Constituent, RegionCandidates, ScoreBreakdown};
pub use error::{Result, ScoringError};
pub use features::{
    DUMMY_SIZE, FUNDAMENTAL_FIELDS, dummy_features, empty_features, features_from_prices,
    merge_fundamentals, merge_news_signal,
};
pub use normalize::{normalize_features, normalize_growth_rate};
pub use score::{RankBy, ScoreWeights, rank_candidates, score_features};
pub use sentiment::title_sentiment;
pub use signals::{BuySignal, Decision, SignalMetrics, SignalThresholds, evaluate_buy_signals};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
