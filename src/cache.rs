//! Time-boxed on-disk snapshot of the last successful pull request fetch.

use crate::config;
use crate::error::CacheError;
use crate::gh::PullRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const CACHE_KEY: &str = "github_prs_cache";
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub prs: Vec<PullRequest>,
    pub written_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age of the snapshot; `None` when it was written "in the future".
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        (now - self.written_at).to_std().ok()
    }

    /// A snapshot stamped ahead of `now` is valid while it is less than
    /// `ttl` ahead.
    pub fn is_valid(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.age(now) {
            Some(age) => age < ttl,
            None => (self.written_at - now)
                .to_std()
                .is_ok_and(|ahead| ahead < ttl),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrCache {
    path: PathBuf,
    ttl: Duration,
}

impl PrCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(config::config_dir)
            .join("prboard")
            .join(format!("{CACHE_KEY}.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Raw read, regardless of expiry. A missing file is not an error.
    pub fn read(&self) -> Result<Option<CacheEntry>, CacheError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// The cached snapshot if one exists and has not expired.
    ///
    /// An unreadable cache counts as empty.
    pub fn load_valid(&self, now: DateTime<Utc>) -> Option<CacheEntry> {
        match self.read() {
            Ok(Some(entry)) if entry.is_valid(now, self.ttl) => Some(entry),
            Ok(Some(entry)) => {
                debug!(written_at = %entry.written_at, "Cached pull requests expired");
                None
            }
            Ok(None) => None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Ignoring unreadable cache");
                None
            }
        }
    }

    pub fn store(&self, prs: &[PullRequest], now: DateTime<Utc>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let entry = CacheEntry {
            prs: prs.to_vec(),
            written_at: now,
        };
        let json = serde_json::to_string(&entry)?;

        // Write next to the target and rename so readers never see half a file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| self.io_error(source))?;
        std::fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;

        debug!(path = %self.path.display(), count = prs.len(), "Wrote pull request cache");
        Ok(())
    }

    /// Delete the cache file. Returns whether there was one.
    pub fn clear(&self) -> Result<bool, CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gh::tests::pr;
    use crate::gh::PrState;
    use chrono::TimeDelta;

    fn cache_in(dir: &tempfile::TempDir) -> PrCache {
        PrCache::new(dir.path().join("nested").join("cache.json"), DEFAULT_TTL)
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        assert!(cache.read().unwrap().is_none());
        assert!(cache.load_valid(Utc::now()).is_none());
        assert!(!cache.clear().unwrap());
    }

    #[test]
    fn store_then_load_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let now = Utc::now();
        let prs = vec![
            pr(1, "Fix crash", "alice", PrState::Open),
            pr(2, "Update docs", "bob", PrState::Closed),
        ];

        cache.store(&prs, now).unwrap();
        let entry = cache.load_valid(now + TimeDelta::minutes(29)).unwrap();
        assert_eq!(entry.prs, prs);
        assert_eq!(entry.written_at, now);
    }

    #[test]
    fn entries_expire_at_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let now = Utc::now();
        cache
            .store(&[pr(1, "Fix crash", "alice", PrState::Open)], now)
            .unwrap();

        assert!(cache.load_valid(now + TimeDelta::minutes(30)).is_none());
        // still on disk for inspection
        assert!(cache.read().unwrap().is_some());
    }

    #[test]
    fn newer_store_supersedes_older() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let now = Utc::now();
        cache
            .store(&[pr(1, "Old", "alice", PrState::Open)], now)
            .unwrap();
        cache
            .store(&[pr(2, "New", "bob", PrState::Closed)], now)
            .unwrap();

        let entry = cache.load_valid(now).unwrap();
        assert_eq!(entry.prs.len(), 1);
        assert_eq!(entry.prs[0].number, 2);
    }

    #[test]
    fn corrupt_file_counts_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        std::fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        std::fs::write(cache.path(), "{ not json").unwrap();

        assert!(matches!(cache.read(), Err(CacheError::Json(_))));
        assert!(cache.load_valid(Utc::now()).is_none());
    }

    #[test]
    fn clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        cache.store(&[], Utc::now()).unwrap();
        assert!(cache.clear().unwrap());
        assert!(cache.read().unwrap().is_none());
    }

    #[test]
    fn slightly_future_timestamp_is_valid() {
        let now = Utc::now();
        let entry = CacheEntry {
            prs: Vec::new(),
            written_at: now + TimeDelta::minutes(5),
        };
        assert_eq!(entry.age(now), None);
        assert!(entry.is_valid(now, DEFAULT_TTL));
    }

    #[test]
    fn far_future_timestamp_is_expired() {
        let now = Utc::now();
        let entry = CacheEntry {
            prs: Vec::new(),
            written_at: now + TimeDelta::hours(2),
        };
        assert!(!entry.is_valid(now, DEFAULT_TTL));

        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        cache.store(&[], entry.written_at).unwrap();
        assert!(cache.load_valid(now).is_none());
    }
}
