//! Redis cache store.
//!
//! Conditional writes use `SET NX PX`. Lock release is a Lua script so the
//! read-compare-delete runs atomically on the server.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;

use ratecache_core::cache::{CacheStore, Result};

use super::error::map_redis_error;
use crate::diagnostics::{KeyDump, KeyEntry};

const COMPARE_AND_DELETE: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Redis cache backend using connection manager for pooling.
#[derive(Clone)]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
    compare_and_delete: redis::Script,
}

impl RedisCache {
    /// Creates a new Redis cache connection.
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self {
            conn,
            compare_and_delete: redis::Script::new(COMPARE_AND_DELETE),
        })
    }
}

/// Redis expiry in milliseconds, at least one.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result: Option<Vec<u8>> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl))
            .await
            .map_err(map_redis_error)
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(deleted == 1)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(map_redis_error)
    }
}

#[async_trait]
impl KeyDump for RedisCache {
    async fn dump_keys(&self, pattern: &str) -> Result<Vec<KeyEntry>> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = {
            let iter = conn
                .scan_match::<_, String>(pattern)
                .await
                .map_err(map_redis_error)?;
            iter.collect().await
        };
        keys.sort();
        keys.dedup();

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let value: Option<Vec<u8>> = conn.get(&key).await.map_err(map_redis_error)?;
            // Expired between SCAN and GET.
            let Some(value) = value else {
                continue;
            };
            let pttl: i64 = conn.pttl(&key).await.map_err(map_redis_error)?;
            entries.push(KeyEntry {
                key,
                value: String::from_utf8_lossy(&value).into_owned(),
                ttl: u64::try_from(pttl).ok().map(Duration::from_millis),
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Helper to get Redis URL from environment.
    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    /// Skip test if Redis not available.
    async fn get_test_cache() -> Option<RedisCache> {
        RedisCache::new(&redis_url()).await.ok()
    }

    fn unique_key(prefix: &str) -> String {
        format!("test:{}:{}", prefix, Uuid::new_v4())
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_redis_set_and_get() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let key = unique_key("rate");

        cache.set(&key, b"200.0", MINUTE).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"200.0".to_vec()));

        cache.delete(&key).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redis_ttl() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let key = unique_key("ttl");

        cache
            .set(&key, b"short-lived", Duration::from_millis(100))
            .await
            .unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redis_set_if_absent() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let key = unique_key("lock");

        assert!(cache.set_if_absent(&key, b"owner-1", MINUTE).await.unwrap());
        assert!(!cache.set_if_absent(&key, b"owner-2", MINUTE).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"owner-1".to_vec()));

        cache.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_compare_and_delete() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let key = unique_key("lock");
        cache.set(&key, b"owner-1", MINUTE).await.unwrap();

        assert!(!cache.compare_and_delete(&key, b"owner-2").await.unwrap());
        assert!(cache.get(&key).await.unwrap().is_some());
        assert!(cache.compare_and_delete(&key, b"owner-1").await.unwrap());
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redis_dump_keys() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let prefix = format!("test:dump:{}", Uuid::new_v4());
        let key1 = format!("{prefix}:a");
        let key2 = format!("{prefix}:b");
        cache.set(&key1, b"1.0", MINUTE).await.unwrap();
        cache.set(&key2, b"2.0", MINUTE).await.unwrap();

        let entries = cache.dump_keys(&format!("{prefix}:*")).await.unwrap();

        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec![key1.as_str(), key2.as_str()]);
        assert_eq!(entries[0].value, "1.0");
        assert!(entries[0].ttl.is_some_and(|ttl| ttl <= MINUTE));

        cache.delete(&key1).await.unwrap();
        cache.delete(&key2).await.unwrap();
    }
}
