//! Redis pub/sub implementation.
//!
//! Each channel gets one Redis subscription, shared by every local receiver
//! through a broadcast channel. The forwarding task ends once its last
//! receiver is gone.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use tokio::sync::{broadcast, RwLock};

use ratecache_core::cache::{CacheError, NotificationChannel, Result};

use super::error::map_redis_error;

/// Channel capacity for forwarded messages.
const CHANNEL_CAPACITY: usize = 100;

/// How often an idle subscription checks for remaining receivers.
const IDLE_CHECK: Duration = Duration::from_secs(5);

type Subscriptions = Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>;

/// Redis pub/sub backend for completion notifications.
pub struct RedisPubSub {
    client: redis::Client,
    conn: redis::aio::ConnectionManager,
    subscriptions: Subscriptions,
}

impl RedisPubSub {
    /// Creates a new Redis pub/sub connection.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = redis::aio::ConnectionManager::new(client.clone())
            .await
            .map_err(map_redis_error)?;

        Ok(Self {
            client,
            conn,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

#[async_trait]
impl NotificationChannel for RedisPubSub {
    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, message)
            .await
            .map_err(|e| CacheError::PublishFailed(e.to_string()))
    }

    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>> {
        {
            let subscriptions = self.subscriptions.read().await;
            if let Some(sender) = subscriptions.get(channel) {
                return Ok(sender.subscribe());
            }
        }

        // SUBSCRIBE completes before we hand out a receiver.
        let mut pubsub = self.client.get_async_pubsub().await.map_err(map_redis_error)?;
        pubsub.subscribe(channel).await.map_err(map_redis_error)?;

        let (tx, rx) = {
            let mut subscriptions = self.subscriptions.write().await;
            // Double-check in case another task subscribed meanwhile
            if let Some(sender) = subscriptions.get(channel) {
                return Ok(sender.subscribe());
            }
            let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
            subscriptions.insert(channel.to_string(), tx.clone());
            (tx, rx)
        };

        let channel = channel.to_string();
        let subscriptions = Arc::clone(&self.subscriptions);
        tokio::spawn(async move {
            run_subscription_loop(pubsub, channel, tx, subscriptions).await;
        });

        Ok(rx)
    }
}

/// Forwards Redis messages to the broadcast channel until nobody listens.
async fn run_subscription_loop(
    mut pubsub: redis::aio::PubSub,
    channel: String,
    tx: broadcast::Sender<String>,
    subscriptions: Subscriptions,
) {
    let mut idle = tokio::time::interval(IDLE_CHECK);
    idle.tick().await;

    {
        let mut stream = pubsub.on_message();
        loop {
            tokio::select! {
                msg = stream.next() => {
                    let Some(msg) = msg else {
                        tracing::info!(channel = %channel, "Redis subscription stream ended");
                        break;
                    };
                    match msg.get_payload::<String>() {
                        // Ignore send errors (no receivers); checked below.
                        Ok(payload) => {
                            let _ = tx.send(payload);
                        }
                        Err(err) => {
                            tracing::warn!(channel = %channel, error = %err, "Unreadable pub/sub payload");
                        }
                    }
                }
                _ = idle.tick() => {}
            }

            if retire_if_unused(&channel, &tx, &subscriptions).await {
                break;
            }
        }
    }

    let mut subs = subscriptions.write().await;
    if subs.get(&channel).is_some_and(|s| s.same_channel(&tx)) {
        subs.remove(&channel);
    }
}

/// Removes the subscription when no receivers are left. New receivers are
/// only created under the read lock, so checking under the write lock cannot
/// miss one.
async fn retire_if_unused(
    channel: &str,
    tx: &broadcast::Sender<String>,
    subscriptions: &Subscriptions,
) -> bool {
    if tx.receiver_count() > 0 {
        return false;
    }
    let mut subs = subscriptions.write().await;
    if tx.receiver_count() > 0 {
        return false;
    }
    if subs.get(channel).is_some_and(|s| s.same_channel(tx)) {
        subs.remove(channel);
    }
    tracing::debug!(channel = %channel, "Dropping idle Redis subscription");
    true
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
    async fn get_test_pubsub() -> Option<RedisPubSub> {
        RedisPubSub::new(&redis_url()).await.ok()
    }

    fn unique_channel() -> String {
        format!("updates:test:{}", Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_redis_pubsub_publish_and_receive() {
        let Some(pubsub) = get_test_pubsub().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let channel = unique_channel();

        let mut rx = pubsub.subscribe(&channel).await.unwrap();
        pubsub.publish(&channel, "done").await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timeout waiting for message")
            .unwrap();
        assert_eq!(received, "done");
    }

    #[tokio::test]
    async fn test_redis_pubsub_multiple_subscribers() {
        let Some(pubsub) = get_test_pubsub().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let channel = unique_channel();

        let mut rx1 = pubsub.subscribe(&channel).await.unwrap();
        let mut rx2 = pubsub.subscribe(&channel).await.unwrap();
        pubsub.publish(&channel, "done").await.unwrap();

        let timeout = Duration::from_secs(2);
        assert_eq!(
            tokio::time::timeout(timeout, rx1.recv()).await.unwrap().unwrap(),
            "done"
        );
        assert_eq!(
            tokio::time::timeout(timeout, rx2.recv()).await.unwrap().unwrap(),
            "done"
        );
    }

    #[tokio::test]
    async fn test_redis_pubsub_different_channels() {
        let Some(pubsub) = get_test_pubsub().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let channel1 = unique_channel();
        let channel2 = unique_channel();

        let mut rx1 = pubsub.subscribe(&channel1).await.unwrap();
        pubsub.publish(&channel2, "done").await.unwrap();

        let received = tokio::time::timeout(Duration::from_millis(200), rx1.recv()).await;
        assert!(
            received.is_err(),
            "Should not receive message for a different channel"
        );
    }

    #[tokio::test]
    async fn test_redis_subscribe_with_timeout() {
        let Some(pubsub) = get_test_pubsub().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let result = pubsub
            .subscribe_with_timeout(&unique_channel(), Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(result, None);
    }
}
