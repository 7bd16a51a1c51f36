use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::Result;

/// Shared key-value store with per-key expiry.
///
/// Implementations must make `set_if_absent` and `compare_and_delete` atomic
/// with respect to every other caller of the same store, including callers in
/// other processes. The coordinator relies on nothing else for mutual
/// exclusion.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Gets a value by key. `None` means the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value with a TTL, overwriting any existing value.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Sets a value only if the key is absent. Returns `true` when the value
    /// was written.
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool>;

    /// Deletes the key only if it currently holds `expected`. Returns `true`
    /// when the key was deleted.
    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool>;

    /// Deletes a key unconditionally.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Named publish/subscribe channels used to wake waiting callers.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Publishes a message to every current subscriber of `channel`.
    async fn publish(&self, channel: &str, message: &str) -> Result<()>;

    /// Subscribes to `channel`. Messages published after this returns are
    /// delivered to the receiver.
    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>>;

    /// Subscribes to `channel` and waits for a single message.
    ///
    /// Returns `Ok(None)` when `timeout` elapses first.
    async fn subscribe_with_timeout(
        &self,
        channel: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let mut receiver = self.subscribe(channel).await?;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Ok(message)) => Ok(Some(message)),
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => Ok(Some(String::new())),
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => Ok(None),
        }
    }
}
