//! Location and lifecycle of the SQLite price cache.

use hobart::data::{DataError, ExpiryPolicy, SqliteCache};
use std::path::{Path, PathBuf};

/// Get the default cache directory path.
///
/// Uses platform-specific cache directories:
/// - Linux: `~/.cache/hobart/`
/// - macOS: `~/Library/Caches/hobart/`
/// - Windows: `%LOCALAPPDATA%\hobart\cache\`
pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hobart")
}

/// Configured cache path, or the default database in [`default_cache_dir`].
pub(crate) fn cache_path(configured: Option<&Path>) -> PathBuf {
    configured.map_or_else(|| default_cache_dir().join("prices.db"), Path::to_path_buf)
}

/// Open the cache with same-day expiry, creating the directory if needed.
pub(crate) fn open_cache(configured: Option<&Path>) -> Result<SqliteCache, DataError> {
    let path = cache_path(configured);
    let cache = SqliteCache::new(&path, ExpiryPolicy::SameDay)?;

    match cache.purge_expired() {
        Ok(0) => {}
        Ok(purged) => tracing::debug!(purged, "purged stale cache entries"),
        Err(e) => tracing::warn!(error = %e, "could not purge stale cache entries"),
    }
    if let Ok(stats) = cache.get_stats() {
        tracing::info!(
            path = %path.display(),
            entries = stats.entries,
            fresh = stats.fresh_entries,
            "price cache opened"
        );
    }
    Ok(cache)
}
