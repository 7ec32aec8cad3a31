//! In-process cache.

use super::{Cache, CacheEntry, ExpiryPolicy};
use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A cache that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    policy: ExpiryPolicy,
}

impl MemoryCache {
    /// Create an empty cache with `policy`.
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
        }
    }

    /// Store a value with an explicit write time.
    pub fn put_at(&self, key: &str, value: &str, cached_at: DateTime<Utc>) {
        self.entries.lock().insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                cached_at,
            },
        );
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|entry| self.policy.is_fresh(entry.cached_at, Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_at(key, value, Utc::now());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_put_then_get() {
        let cache = MemoryCache::new(ExpiryPolicy::SameDay);
        cache.put("k", "v").unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(cache.get("missing").unwrap(), None);
    }

    #[test]
    fn test_stale_entry_is_not_served() {
        let cache = MemoryCache::new(ExpiryPolicy::Ttl(Duration::minutes(5)));
        cache.put_at("k", "old", Utc::now() - Duration::hours(1));
        assert_eq!(cache.get("k").unwrap(), None);
        assert_eq!(cache.len(), 1);

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }
}
