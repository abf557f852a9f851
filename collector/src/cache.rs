//! Time-boxed cache for slow-moving external facts.
//!
//! Third-party APIs (the GitHub releases API, public chain RPC endpoints)
//! are rate limited and change slowly, so the collector must not hit them
//! on every poll cycle. This module provides [`ExternalDataCache`], a small
//! key -> `{fetched_at, value}` store that:
//!
//! - serves a cached value while it is younger than the caller's TTL,
//! - performs exactly one refetch attempt once the value has expired,
//! - falls back to the stale value when a refetch fails ("best available"),
//! - persists across restarts as a flat JSON file under the data directory.
//!
//! A corrupt or missing cache file is treated as an empty cache, never as
//! an error: the cache degrades, it does not fail.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Sentinel returned when a value has never been fetched successfully.
///
/// Callers that need a numeric value map this to `0`.
pub const UNKNOWN: &str = "unknown";

/// One cached external fact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unix timestamp (seconds) at which the value was last fetched.
    pub fetched_at: u64,
    /// The raw fetched value.
    pub value: String,
}

/// Flat-file cache of external facts, owned by the poll loop.
///
/// Only one collector process writes a given cache file, so no locking is
/// needed beyond the atomic rename used when persisting.
pub struct ExternalDataCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl ExternalDataCache {
    /// Opens the cache backed by `path`, loading any previously persisted
    /// entries. A missing or unreadable file yields an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path).unwrap_or_default();
        Self { path, entries }
    }

    /// Returns the best available value for `key`.
    ///
    /// If a cached entry younger than `ttl` exists it is returned without
    /// touching the network. Otherwise `fetch` is invoked once; on success
    /// the result is stored (and persisted) and returned, on failure the
    /// stale cached value is returned unchanged. With no cached value and a
    /// failed fetch, the [`UNKNOWN`] sentinel is returned.
    pub async fn get_or_refresh<F, Fut, E>(&mut self, key: &str, ttl: Duration, fetch: F) -> String
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: fmt::Display,
    {
        let now = unix_now();
        if let Some(entry) = self.entries.get(key) {
            if now.saturating_sub(entry.fetched_at) < ttl.as_secs() {
                return entry.value.clone();
            }
        }

        match fetch().await {
            Ok(value) if !value.is_empty() => {
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        fetched_at: now,
                        value: value.clone(),
                    },
                );
                if let Err(e) = self.persist() {
                    warn!(key, error = %e, "failed to persist external data cache");
                }
                debug!(key, value = %value, "refreshed external data cache entry");
                value
            }
            Ok(_) => {
                warn!(key, "external fetch returned an empty value, keeping stale entry");
                self.stale_or_unknown(key)
            }
            Err(e) => {
                warn!(key, error = %e, "external fetch failed, keeping stale entry");
                self.stale_or_unknown(key)
            }
        }
    }

    fn stale_or_unknown(&self, key: &str) -> String {
        self.entries
            .get(key)
            .map(|e| e.value.clone())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Writes the cache file via a sibling temp path and an atomic rename.
    fn persist(&self) -> io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        let body = serde_json::to_vec_pretty(&self.entries)?;
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)
    }

    #[cfg(test)]
    fn insert_raw(&mut self, key: &str, entry: CacheEntry) {
        self.entries.insert(key.to_string(), entry);
    }
}

fn load_entries(path: &Path) -> Option<HashMap<String, CacheEntry>> {
    let bytes = std::fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt cache file, starting empty");
            None
        }
    }
}

/// Current wall-clock time as seconds since the Unix epoch.
///
/// Falls back to 0 if the system clock reports a time before the epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn cache_in(dir: &tempfile::TempDir) -> ExternalDataCache {
        ExternalDataCache::open(dir.path().join("external-cache.json"))
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);
        let calls = Cell::new(0u32);

        let fetch = || async {
            calls.set(calls.get() + 1);
            Ok::<_, String>("v1.2.3".to_string())
        };
        let first = cache
            .get_or_refresh("release", Duration::from_secs(300), fetch)
            .await;
        assert_eq!(first, "v1.2.3");
        assert_eq!(calls.get(), 1);

        // Within the TTL the stored value comes back with no fetch.
        let second = cache
            .get_or_refresh("release", Duration::from_secs(300), || async {
                calls.set(calls.get() + 1);
                Ok::<_, String>("v9.9.9".to_string())
            })
            .await;
        assert_eq!(second, "v1.2.3");
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_exactly_one_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);
        cache.insert_raw(
            "release",
            CacheEntry {
                fetched_at: unix_now() - 600,
                value: "v1.0.0".to_string(),
            },
        );

        let calls = Cell::new(0u32);
        let value = cache
            .get_or_refresh("release", Duration::from_secs(300), || async {
                calls.set(calls.get() + 1);
                Ok::<_, String>("v1.1.0".to_string())
            })
            .await;
        assert_eq!(value, "v1.1.0");
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn failed_refetch_serves_stale_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);
        cache.insert_raw(
            "network_height",
            CacheEntry {
                fetched_at: unix_now() - 600,
                value: "1234".to_string(),
            },
        );

        let value = cache
            .get_or_refresh("network_height", Duration::from_secs(300), || async {
                Err::<String, _>("connection refused".to_string())
            })
            .await;
        assert_eq!(value, "1234");
    }

    #[tokio::test]
    async fn first_fetch_failure_yields_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        let value = cache
            .get_or_refresh("release", Duration::from_secs(300), || async {
                Err::<String, _>("timeout".to_string())
            })
            .await;
        assert_eq!(value, UNKNOWN);
    }

    #[tokio::test]
    async fn empty_fetch_result_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        let value = cache
            .get_or_refresh("release", Duration::from_secs(300), || async {
                Ok::<_, String>(String::new())
            })
            .await;
        assert_eq!(value, UNKNOWN);
    }

    #[tokio::test]
    async fn entries_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("external-cache.json");

        let mut cache = ExternalDataCache::open(&path);
        cache
            .get_or_refresh("release", Duration::from_secs(300), || async {
                Ok::<_, String>("v2.0.0".to_string())
            })
            .await;
        drop(cache);

        let mut reopened = ExternalDataCache::open(&path);
        let value = reopened
            .get_or_refresh("release", Duration::from_secs(300), || async {
                Err::<String, _>("should not be called".to_string())
            })
            .await;
        assert_eq!(value, "v2.0.0");
    }

    #[tokio::test]
    async fn corrupt_cache_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("external-cache.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let mut cache = ExternalDataCache::open(&path);
        let value = cache
            .get_or_refresh("release", Duration::from_secs(300), || async {
                Ok::<_, String>("v3.0.0".to_string())
            })
            .await;
        assert_eq!(value, "v3.0.0");
    }
}
