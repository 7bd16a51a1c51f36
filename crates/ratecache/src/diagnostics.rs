//! Debugging aid: list what the cache currently holds.
//!
//! Nothing on the read path calls into this module. Listing keys scans the
//! whole store, so it is only exposed through the `dump-keys` command.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use ratecache_core::cache::Result;

/// One stored key with its value rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyEntry {
    pub key: String,
    pub value: String,
    /// Time left before expiry, `None` when the key never expires.
    #[serde(rename = "ttl_ms", serialize_with = "serialize_ttl")]
    pub ttl: Option<Duration>,
}

fn serialize_ttl<S: serde::Serializer>(
    ttl: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match ttl {
        Some(ttl) => serializer.serialize_some(&(ttl.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

/// Stores that can enumerate their keys.
#[async_trait]
pub trait KeyDump: Send + Sync {
    /// Lists live keys matching a `*` glob, sorted by key.
    async fn dump_keys(&self, pattern: &str) -> Result<Vec<KeyEntry>>;
}

/// Logs every matching key at info level and returns the entries.
pub async fn log_keys(store: &dyn KeyDump, pattern: &str) -> Result<Vec<KeyEntry>> {
    let entries = store.dump_keys(pattern).await?;
    tracing::info!(pattern = %pattern, count = entries.len(), "Dumping cache keys");
    for entry in &entries {
        tracing::info!(key = %entry.key, value = %entry.value, ttl = ?entry.ttl, "Cache key");
    }
    Ok(entries)
}
