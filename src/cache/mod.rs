//! Cache stores
//!
//! One key space serves two purposes: memoizing accepted content and recording
//! poison markers for items that exhausted their retries. A read therefore has
//! three outcomes, see [`CacheLookup`].
//!
//! ## Implementations
//! - [`NoCache`]: always misses, drops writes
//! - [`MemoryCache`]: in-process map with monotonic expiry
//! - [`SqliteCache`]: persistent store shared across runs and processes

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::Result;

mod sqlite;

pub use sqlite::SqliteCache;

/// Outcome of a cache read
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheLookup {
    /// No live entry for the key
    Miss,
    /// Previously accepted content
    Content(String),
    /// Failure marker written after retries ran out
    Poisoned,
}

/// Key/value store with per-entry time-to-live
///
/// `put` with `None` writes a poison marker, with `Some` writes content. An entry
/// past its TTL reads as [`CacheLookup::Miss`]; a zero TTL expires immediately,
/// so writing with it removes any existing entry.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a key
    async fn get(&self, key: &str) -> Result<CacheLookup>;

    /// Store content (`Some`) or a poison marker (`None`) for `ttl`
    async fn put(&self, key: &str, value: Option<&str>, ttl: Duration) -> Result<()>;
}

/// Cache that never holds anything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

#[async_trait::async_trait]
impl CacheStore for NoCache {
    async fn get(&self, _key: &str) -> Result<CacheLookup> {
        Ok(CacheLookup::Miss)
    }

    async fn put(&self, _key: &str, _value: Option<&str>, _ttl: Duration) -> Result<()> {
        Ok(())
    }
}

struct MemoryEntry {
    value: Option<String>,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process cache; entries are dropped lazily once expired
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones not yet purged included
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// True if nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<CacheLookup> {
        let mut entries = self.entries.lock().await;
        let lookup = match entries.get(key) {
            None => return Ok(CacheLookup::Miss),
            Some(entry) if entry.is_expired(Instant::now()) => None,
            Some(entry) => Some(match &entry.value {
                Some(content) => CacheLookup::Content(content.clone()),
                None => CacheLookup::Poisoned,
            }),
        };

        match lookup {
            Some(hit) => Ok(hit),
            None => {
                entries.remove(key);
                Ok(CacheLookup::Miss)
            }
        }
    }

    async fn put(&self, key: &str, value: Option<&str>, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if ttl.is_zero() {
            entries.remove(key);
            return Ok(());
        }

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.map(str::to_string),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_cache_always_misses() {
        let cache = NoCache;

        cache
            .put("k", Some("v"), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("k").await.unwrap(), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn memory_cache_distinguishes_content_and_poison() {
        let cache = MemoryCache::new();

        cache
            .put("ok", Some("body"), Duration::from_secs(60))
            .await
            .unwrap();
        cache.put("bad", None, Duration::from_secs(60)).await.unwrap();

        assert_eq!(
            cache.get("ok").await.unwrap(),
            CacheLookup::Content("body".into())
        );
        assert_eq!(cache.get("bad").await.unwrap(), CacheLookup::Poisoned);
        assert_eq!(cache.get("missing").await.unwrap(), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn memory_cache_entries_expire() {
        let cache = MemoryCache::new();
        cache
            .put("k", Some("v"), Duration::from_millis(30))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.get("k").await.unwrap(), CacheLookup::Miss);
        assert!(cache.is_empty().await, "expired entry should be dropped on read");
    }

    #[tokio::test]
    async fn zero_ttl_removes_existing_entry() {
        let cache = MemoryCache::new();
        cache
            .put("k", Some("v"), Duration::from_secs(60))
            .await
            .unwrap();

        cache.put("k", None, Duration::ZERO).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), CacheLookup::Miss);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn later_write_replaces_earlier_one() {
        let cache = MemoryCache::new();
        cache.put("k", None, Duration::from_secs(60)).await.unwrap();
        cache
            .put("k", Some("fresh"), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get("k").await.unwrap(),
            CacheLookup::Content("fresh".into())
        );
    }

    #[tokio::test]
    async fn purge_expired_keeps_live_entries() {
        let cache = MemoryCache::new();
        cache
            .put("short", Some("a"), Duration::from_millis(20))
            .await
            .unwrap();
        cache
            .put("long", Some("b"), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(
            cache.get("long").await.unwrap(),
            CacheLookup::Content("b".into())
        );
    }

    #[tokio::test]
    async fn unrepresentable_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.put("poison", None, Duration::MAX).await.unwrap();
        cache
            .put("content", Some("v"), Duration::from_secs(u64::MAX))
            .await
            .unwrap();

        assert_eq!(cache.purge_expired().await, 0);
        assert_eq!(cache.get("poison").await.unwrap(), CacheLookup::Poisoned);
        assert_eq!(
            cache.get("content").await.unwrap(),
            CacheLookup::Content("v".into())
        );
    }
}
