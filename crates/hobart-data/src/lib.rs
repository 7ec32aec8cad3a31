#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod panel;
pub mod source;
pub mod text;
pub mod yahoo;

pub use cache::{Cache, CachedPriceSource, ExpiryPolicy, MemoryCache, SqliteCache};
pub use error::{DataError, Result};
pub use panel::PricePanel;
pub use source::{
    FundamentalsSource, FundamentalsTable, NewsItem, NewsSource, NoFundamentals, NoNews,
    PriceHistory, PriceSource, StaticFundamentals, StaticPriceSource,
};
pub use text::{DisabledTextGenerator, OpenAiTextGenerator, TextGenerator};
pub use yahoo::YahooPriceSource;

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
