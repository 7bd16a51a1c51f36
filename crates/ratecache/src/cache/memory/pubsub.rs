//! In-memory pub/sub implementation.
//!
//! One tokio broadcast channel per channel name. Channels are created on
//! first subscribe. Every publish, and every channel creation, drops the
//! senders nobody listens to any more, so the map only holds channels with
//! live receivers plus the ones published to since.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use ratecache_core::cache::{NotificationChannel, Result};

/// Channel capacity for pub/sub messages.
const CHANNEL_CAPACITY: usize = 100;

/// In-memory pub/sub implementation.
#[derive(Debug, Clone, Default)]
pub struct MemoryPubSub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
}

impl MemoryPubSub {
    /// Creates a new empty pub/sub instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to `channel`, creating it if needed.
    ///
    /// The receiver is created under the map lock so a concurrent publish
    /// never retires a sender that is about to gain a listener.
    async fn subscribe_or_create(&self, channel: &str) -> broadcast::Receiver<String> {
        // Try read lock first to avoid write contention
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(channel) {
                return sender.subscribe();
            }
        }

        let mut channels = self.channels.write().await;

        // Double-check after acquiring write lock
        if let Some(sender) = channels.get(channel) {
            return sender.subscribe();
        }

        retire_unused(&mut channels);
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        channels.insert(channel.to_string(), sender);
        receiver
    }
}

fn retire_unused(channels: &mut HashMap<String, broadcast::Sender<String>>) {
    channels.retain(|_, sender| sender.receiver_count() > 0);
}

#[async_trait]
impl NotificationChannel for MemoryPubSub {
    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(channel) {
            // Fails only when nobody is listening.
            let _ = sender.send(message.to_string());
        }
        retire_unused(&mut channels);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>> {
        Ok(self.subscribe_or_create(channel).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CHANNEL: &str = "updates:rate:magnificent-resort:1-king-bed:2024-10-28";

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let pubsub = MemoryPubSub::new();

        let mut receiver = pubsub.subscribe(CHANNEL).await.unwrap();
        pubsub.publish(CHANNEL, "done").await.unwrap();

        assert_eq!(receiver.recv().await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let pubsub = MemoryPubSub::new();

        let mut receiver1 = pubsub.subscribe(CHANNEL).await.unwrap();
        let mut receiver2 = pubsub.subscribe(CHANNEL).await.unwrap();
        pubsub.publish(CHANNEL, "done").await.unwrap();

        assert_eq!(receiver1.recv().await.unwrap(), "done");
        assert_eq!(receiver2.recv().await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let pubsub = MemoryPubSub::new();

        let mut receiver1 = pubsub.subscribe("updates:one").await.unwrap();
        let mut receiver2 = pubsub.subscribe("updates:two").await.unwrap();

        pubsub.publish("updates:one", "done").await.unwrap();
        assert_eq!(receiver1.recv().await.unwrap(), "done");
        assert!(receiver2.try_recv().is_err());

        pubsub.publish("updates:two", "failed").await.unwrap();
        assert_eq!(receiver2.recv().await.unwrap(), "failed");
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let pubsub = MemoryPubSub::new();

        assert!(pubsub.publish(CHANNEL, "done").await.is_ok());
        assert!(pubsub.channels.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_channel_reuse_and_cleanup() {
        let pubsub = MemoryPubSub::new();

        let receiver1 = pubsub.subscribe(CHANNEL).await.unwrap();
        let receiver2 = pubsub.subscribe(CHANNEL).await.unwrap();
        assert_eq!(pubsub.channels.read().await.len(), 1);

        drop(receiver1);
        drop(receiver2);
        pubsub.publish(CHANNEL, "done").await.unwrap();

        assert!(pubsub.channels.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_finished_channels_do_not_accumulate() {
        let pubsub = MemoryPubSub::new();

        for i in 0..1000 {
            let channel = format!("updates:rate:hotel-{i}:room:period");
            let mut receiver = pubsub.subscribe(&channel).await.unwrap();
            pubsub.publish(&channel, "done").await.unwrap();
            assert_eq!(receiver.recv().await.unwrap(), "done");
            drop(receiver);
        }

        assert!(pubsub.channels.read().await.len() <= 1);

        pubsub.publish("updates:unrelated", "done").await.unwrap();
        assert!(pubsub.channels.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_keeps_channels_with_listeners() {
        let pubsub = MemoryPubSub::new();

        let _listening = pubsub.subscribe("updates:one").await.unwrap();
        let abandoned = pubsub.subscribe("updates:two").await.unwrap();
        drop(abandoned);

        pubsub.publish("updates:one", "done").await.unwrap();

        let channels = pubsub.channels.read().await;
        assert!(channels.contains_key("updates:one"));
        assert!(!channels.contains_key("updates:two"));
    }

    #[tokio::test]
    async fn test_subscribe_with_timeout() {
        let pubsub = MemoryPubSub::new();

        let timed_out = pubsub
            .subscribe_with_timeout(CHANNEL, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(timed_out, None);

        let publisher = pubsub.clone();
        let waiter = tokio::spawn(async move {
            publisher
                .subscribe_with_timeout(CHANNEL, Duration::from_secs(2))
                .await
                .unwrap()
        });
        // Give the waiter time to subscribe.
        tokio::time::sleep(Duration::from_millis(50)).await;
        pubsub.publish(CHANNEL, "done").await.unwrap();

        assert_eq!(waiter.await.unwrap(), Some("done".to_string()));
    }
}
