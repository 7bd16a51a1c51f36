//! In-memory cache store with LRU eviction.
//!
//! Every operation takes the single write lock, which makes the conditional
//! operations atomic with respect to each other. This only coordinates callers
//! inside one process; use the Redis store when several processes share a
//! cache.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use ratecache_core::cache::{pattern_matches, CacheStore, Result};

use crate::diagnostics::{KeyDump, KeyEntry};

/// A single cache entry with its expiry.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory cache implementation with LRU eviction.
///
/// Expired entries are dropped lazily when touched. A capacity of zero is
/// treated as one.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_entries` keys.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    /// Number of live entries, expired ones excluded.
    pub async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.iter().filter(|(_, entry)| !entry.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Returns the live value under `key`, evicting it first if expired.
fn live<'a>(store: &'a mut LruCache<String, CacheEntry>, key: &str) -> Option<&'a CacheEntry> {
    if store.peek(key).is_some_and(CacheEntry::is_expired) {
        store.pop(key);
        return None;
    }
    store.get(key)
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut store = self.store.write().await;
        Ok(live(&mut store, key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut store = self.store.write().await;
        store.put(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool> {
        let mut store = self.store.write().await;
        if live(&mut store, key).is_some() {
            return Ok(false);
        }
        store.put(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool> {
        let mut store = self.store.write().await;
        let matches = live(&mut store, key).is_some_and(|entry| entry.value == expected);
        if matches {
            store.pop(key);
        }
        Ok(matches)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut store = self.store.write().await;
        store.pop(key);
        Ok(())
    }
}

#[async_trait]
impl KeyDump for MemoryCache {
    async fn dump_keys(&self, pattern: &str) -> Result<Vec<KeyEntry>> {
        let store = self.store.read().await;
        let now = Instant::now();
        let mut entries: Vec<KeyEntry> = store
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && pattern_matches(pattern, key))
            .map(|(key, entry)| KeyEntry {
                key: key.clone(),
                value: String::from_utf8_lossy(&entry.value).into_owned(),
                ttl: Some(entry.expires_at.saturating_duration_since(now)),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}
