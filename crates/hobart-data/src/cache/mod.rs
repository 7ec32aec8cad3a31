//! Caching layer for fetched market data.
//!
//! A [`Cache`] is a string key-value store with an [`ExpiryPolicy`] applied on read.
//! It is injected into [`CachedPriceSource`] rather than hidden inside a client.

pub mod memory;
pub mod source;
pub mod sqlite;

pub use memory::MemoryCache;
pub use source::CachedPriceSource;
pub use sqlite::{CacheStats, SqliteCache};

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};

/// When a cached entry stops being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Entries never expire.
    Never,
    /// Entries expire at the end of the UTC day they were written.
    #[default]
    SameDay,
    /// Entries expire after a fixed age.
    Ttl(Duration),
}

impl ExpiryPolicy {
    /// Whether an entry written at `cached_at` may still be served at `now`.
    pub fn is_fresh(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::Never => true,
            Self::SameDay => cached_at.date_naive() == now.date_naive(),
            Self::Ttl(ttl) => now.signed_duration_since(cached_at) <= *ttl,
        }
    }
}

/// A stored value with its write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Payload
    pub value: String,
    /// When the payload was written
    pub cached_at: DateTime<Utc>,
}

/// Key-value cache with expiry.
pub trait Cache: Send + Sync + std::fmt::Debug {
    /// The fresh value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous entry.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Drop every entry.
    fn clear(&self) -> Result<()>;
}
