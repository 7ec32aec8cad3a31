//! SQLite caching layer.

use super::{Cache, CacheEntry, ExpiryPolicy};
use crate::error::{DataError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

/// SQLite-backed key-value cache.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
    policy: ExpiryPolicy,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of stored entries
    pub entries: usize,
    /// Entries that would still be served now
    pub fresh_entries: usize,
}

impl SqliteCache {
    /// Open (or create) a cache database at `path`.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    /// * `policy` - Expiry policy applied on read
    pub fn new<P: AsRef<Path>>(path: P, policy: ExpiryPolicy) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let cache = Self {
            conn: Mutex::new(conn),
            policy,
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory(policy: ExpiryPolicy) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn: Mutex::new(conn),
            policy,
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                cached_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Read the raw entry under `key` regardless of freshness.
    pub fn entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row: Option<(String, String)> = self
            .conn
            .lock()
            .query_row(
                "SELECT value, cached_at FROM entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(value, cached_at)| {
            Ok(CacheEntry {
                value,
                cached_at: parse_timestamp(&cached_at)?,
            })
        })
        .transpose()
    }

    /// Store a value with an explicit write time.
    pub fn put_at(&self, key: &str, value: &str, cached_at: DateTime<Utc>) -> Result<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO entries (key, value, cached_at) VALUES (?1, ?2, ?3)",
            params![key, value, cached_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete entries the expiry policy would no longer serve.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let conn = self.conn.lock();
        let stale: Vec<String> = {
            let mut stmt = conn.prepare("SELECT key, cached_at FROM entries")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut stale = Vec::new();
            for row in rows {
                let (key, cached_at) = row?;
                if !self.policy.is_fresh(parse_timestamp(&cached_at)?, now) {
                    stale.push(key);
                }
            }
            stale
        };

        let tx = conn.unchecked_transaction()?;
        for key in &stale {
            tx.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    /// Get cache statistics.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let now = Utc::now();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT cached_at FROM entries")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut entries = 0;
        let mut fresh_entries = 0;
        for row in rows {
            entries += 1;
            if self.policy.is_fresh(parse_timestamp(&row?)?, now) {
                fresh_entries += 1;
            }
        }

        Ok(CacheStats {
            entries,
            fresh_entries,
        })
    }
}

impl Cache for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entry(key)?
            .filter(|entry| self.policy.is_fresh(entry.cached_at, Utc::now()))
            .map(|entry| entry.value))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_at(key, value, Utc::now())
    }

    fn clear(&self) -> Result<()> {
        self.conn.lock().execute("DELETE FROM entries", [])?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DataError::Parse(format!("Invalid cache timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_cache_initialization() {
        let cache = SqliteCache::in_memory(ExpiryPolicy::SameDay);
        assert!(cache.is_ok());
    }

    #[test]
    fn test_put_get_replace() {
        let cache = SqliteCache::in_memory(ExpiryPolicy::Never).unwrap();

        cache.put("prices:AAPL", "{}").unwrap();
        assert_eq!(cache.get("prices:AAPL").unwrap().as_deref(), Some("{}"));

        cache.put("prices:AAPL", "[1]").unwrap();
        assert_eq!(cache.get("prices:AAPL").unwrap().as_deref(), Some("[1]"));

        assert_eq!(cache.get("prices:MSFT").unwrap(), None);
    }

    #[test]
    fn test_expired_entries_are_hidden_and_purged() {
        let cache = SqliteCache::in_memory(ExpiryPolicy::Ttl(Duration::hours(1))).unwrap();
        cache
            .put_at("old", "x", Utc::now() - Duration::hours(3))
            .unwrap();
        cache.put("new", "y").unwrap();

        assert_eq!(cache.get("old").unwrap(), None);
        assert!(cache.entry("old").unwrap().is_some());

        let stats = cache.get_stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.fresh_entries, 1);

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.get_stats().unwrap().entries, 1);
    }

    #[test]
    fn test_clear() {
        let cache = SqliteCache::in_memory(ExpiryPolicy::SameDay).unwrap();
        cache.put("a", "1").unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.get_stats().unwrap().entries, 0);
    }

    #[test]
    fn test_file_backed_cache_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");

        {
            let cache = SqliteCache::new(&path, ExpiryPolicy::SameDay).unwrap();
            cache.put("k", "v").unwrap();
        }

        let reopened = SqliteCache::new(&path, ExpiryPolicy::SameDay).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
    }
}
