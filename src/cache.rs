// ============================================================================
// File: src/cache.rs
// Best-effort key/value caches with expiry
// ============================================================================

use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::CacheError;

/// Key/value store with per-entry expiry
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), CacheError>;

    async fn is_available(&self) -> bool;
}

/// Caching disabled
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set_with_expiry(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn is_available(&self) -> bool {
        false
    }
}

struct MemoryEntry {
    value: String,
    /// None when the TTL is too large to represent; the entry never expires
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// In-process LRU cache; entries also expire after their TTL
pub struct MemoryCache {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        match entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.is_live() => {
                return Ok(Some(entry.value.clone()))
            }
            Some(_) => {}
        }

        entries.pop(key);
        Ok(None)
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        entries.put(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.entries.lock().is_ok()
    }
}

#[derive(Serialize, Deserialize)]
struct DiskEntry {
    /// Unix seconds
    expires_at: i64,
    value: String,
}

/// One JSON file per key, so cached searches survive between CLI runs
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<user cache dir>/ai-search-agent`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("ai-search-agent"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }

    /// Remove expired and unreadable entries; returns how many files were deleted
    pub async fn prune_expired(&self) -> Result<usize, CacheError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now().timestamp();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let expired = match fs::read_to_string(&path).await {
                Ok(raw) => serde_json::from_str::<DiskEntry>(&raw)
                    .map_or(true, |entry| now >= entry.expires_at),
                Err(_) => continue,
            };
            if expired && fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.entry_path(key);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: DiskEntry = serde_json::from_str(&raw)?;
        if Utc::now().timestamp() >= entry.expires_at {
            // Expired; a failed removal only means the next read repeats this check
            let _ = fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).await?;

        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let entry = DiskEntry {
            expires_at: Utc::now().timestamp().saturating_add(ttl_secs),
            value: value.to_string(),
        };
        fs::write(self.entry_path(key), serde_json::to_vec(&entry)?).await?;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        fs::create_dir_all(&self.dir).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_cache() -> MemoryCache {
        MemoryCache::new(NonZeroUsize::new(4).unwrap())
    }

    #[tokio::test]
    async fn memory_cache_round_trips_within_ttl() {
        let cache = memory_cache();
        cache
            .set_with_expiry("search:abc", "{}", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("search:abc").await.unwrap().as_deref(), Some("{}"));
        assert!(cache.get("search:missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_cache_expires_entries() {
        let cache = memory_cache();
        cache
            .set_with_expiry("search:abc", "{}", Duration::ZERO)
            .await
            .unwrap();
        assert!(cache.get("search:abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_cache_evicts_least_recently_used() {
        let cache = MemoryCache::new(NonZeroUsize::new(1).unwrap());
        let ttl = Duration::from_secs(60);
        cache.set_with_expiry("a", "1", ttl).await.unwrap();
        cache.set_with_expiry("b", "2", ttl).await.unwrap();
        assert!(cache.get("a").await.unwrap().is_none());
        assert_eq!(cache.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn disk_cache_round_trips_and_expires() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("nested"));

        cache
            .set_with_expiry("search:abc", "payload", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            cache.get("search:abc").await.unwrap().as_deref(),
            Some("payload")
        );

        cache
            .set_with_expiry("search:old", "stale", Duration::ZERO)
            .await
            .unwrap();
        assert!(cache.get("search:old").await.unwrap().is_none());
        assert!(!cache.entry_path("search:old").exists());
    }

    #[tokio::test]
    async fn disk_cache_reports_corrupt_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        std::fs::write(cache.entry_path("search:bad"), "not json").unwrap();
        assert!(matches!(
            cache.get("search:bad").await,
            Err(CacheError::Serialize(_))
        ));
    }

    #[tokio::test]
    async fn memory_cache_accepts_unbounded_ttl() {
        let cache = memory_cache();
        cache
            .set_with_expiry("search:abc", "{}", Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert_eq!(cache.get("search:abc").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn disk_cache_prunes_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache
            .set_with_expiry("search:fresh", "keep", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set_with_expiry("search:stale", "drop", Duration::ZERO)
            .await
            .unwrap();
        std::fs::write(cache.entry_path("search:bad"), "not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "untouched").unwrap();

        assert_eq!(cache.prune_expired().await.unwrap(), 2);
        assert!(cache.entry_path("search:fresh").exists());
        assert!(!cache.entry_path("search:stale").exists());
        assert!(!cache.entry_path("search:bad").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn pruning_a_missing_dir_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("absent"));
        assert_eq!(cache.prune_expired().await.unwrap(), 0);
    }

    #[test]
    fn disk_keys_are_file_safe() {
        let cache = DiskCache::new("/tmp/cache");
        assert_eq!(
            cache.entry_path("search:ab12"),
            PathBuf::from("/tmp/cache/search_ab12.json")
        );
    }

    #[tokio::test]
    async fn no_cache_never_hits() {
        let cache = NoCache;
        cache
            .set_with_expiry("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(!cache.is_available().await);
    }
}
