use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use super::follower::FollowOutcome;
use super::{Coordinator, CoordinatorError};
use crate::cache::{
    heartbeat_key, lock_key, updates_channel, CacheError, CacheKey, CacheStore, Heartbeat,
};
use crate::instrumentation::{CacheEvent, EventKind};
use crate::producer::ValueProducer;

/// Published on the updates channel once the leader has finished.
pub(super) const DONE: &str = "done";
pub(super) const FAILED: &str = "failed";

/// How a coordinated read ended.
pub(super) enum Coordination<V> {
    /// The call was served as leader or follower.
    Resolved(Result<V, CoordinatorError>),
    /// The store failed mid-protocol.
    StoreUnavailable(CacheError),
    /// Deadline passed or lock attempts ran out.
    Abandoned(&'static str),
}

impl<P: ValueProducer> Coordinator<P> {
    /// Runs the lock loop until this call is served as leader or follower, or
    /// gives up.
    pub(super) async fn coordinate(
        &self,
        key: &CacheKey,
        request: &P::Request,
        deadline: Instant,
    ) -> Coordination<P::Value> {
        let lock = lock_key(key.as_str());

        for attempt in 1..=self.config.max_lock_attempts {
            if Instant::now() >= deadline {
                return Coordination::Abandoned("deadline exceeded");
            }

            let token = Uuid::new_v4().to_string();
            let acquired = match self
                .store
                .set_if_absent(&lock, token.as_bytes(), self.config.lock_ttl)
                .await
            {
                Ok(acquired) => acquired,
                Err(err) => return Coordination::StoreUnavailable(err),
            };

            if acquired {
                tracing::debug!(cache_key = %key, attempt, "Acquired lock");
                return Coordination::Resolved(self.lead(key, request, &lock, &token).await);
            }

            tracing::info!(cache_key = %key, attempt, "Lock held elsewhere, waiting for leader");
            match self.follow(key, &lock, deadline).await {
                FollowOutcome::Value(value) => return Coordination::Resolved(Ok(value)),
                FollowOutcome::LockReleased | FollowOutcome::TookOver => continue,
                FollowOutcome::DeadlineExceeded => return Coordination::Abandoned("deadline exceeded"),
                FollowOutcome::StoreUnavailable(err) => return Coordination::StoreUnavailable(err),
            }
        }

        Coordination::Abandoned("lock attempts exhausted")
    }

    /// Leader branch. The lock is released on every path out of here.
    async fn lead(
        &self,
        key: &CacheKey,
        request: &P::Request,
        lock: &str,
        token: &str,
    ) -> Result<P::Value, CoordinatorError> {
        let heartbeat = if self.config.heartbeat {
            Some(self.start_heartbeat(key, token).await)
        } else {
            None
        };

        let result = self.produce_as_leader(key, request).await;

        let message = if result.is_ok() { DONE } else { FAILED };
        if let Err(err) = self
            .channel
            .publish(&updates_channel(key.as_str()), message)
            .await
        {
            tracing::warn!(cache_key = %key, error = %err, "Failed to publish update");
        }

        if let Some(heartbeat) = heartbeat {
            heartbeat.stop();
        }
        self.release(key, lock, token).await;

        result
    }

    async fn produce_as_leader(
        &self,
        key: &CacheKey,
        request: &P::Request,
    ) -> Result<P::Value, CoordinatorError> {
        // Another leader may have filled the entry between our miss and the lock.
        match self.read_cached(key).await {
            Ok(Some(value)) => {
                tracing::debug!(cache_key = %key, "Value cached while acquiring lock");
                self.emit(CacheEvent::new(EventKind::Hit, key));
                return Ok(value);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Double-check read failed");
            }
        }

        let value = self.fetch_with_retry(key, request).await?;
        self.write_through(key, &value).await;
        Ok(value)
    }

    async fn start_heartbeat(&self, key: &CacheKey, token: &str) -> HeartbeatHandle {
        let beat_key = heartbeat_key(key.as_str());
        let ttl = self.config.heartbeat_ttl;

        if let Err(err) = beat(self.store.as_ref(), &beat_key, token, ttl).await {
            tracing::warn!(cache_key = %key, error = %err, "Failed to write heartbeat");
        }

        HeartbeatHandle::spawn(
            Arc::clone(&self.store),
            beat_key,
            token.to_string(),
            self.config.heartbeat_interval,
            ttl,
        )
    }

    /// Deletes the lock only if it still holds `token`.
    async fn release(&self, key: &CacheKey, lock: &str, token: &str) {
        match self.store.compare_and_delete(lock, token.as_bytes()).await {
            Ok(true) => {
                tracing::debug!(cache_key = %key, "Released lock");
                if self.config.heartbeat {
                    if let Err(err) = self.store.delete(&heartbeat_key(key.as_str())).await {
                        tracing::warn!(cache_key = %key, error = %err, "Failed to delete heartbeat");
                    }
                }
            }
            Ok(false) => {
                tracing::warn!(
                    cache_key = %key,
                    "Lock expired or was taken over before release"
                );
            }
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Failed to release lock");
            }
        }
    }
}

async fn beat(
    store: &dyn CacheStore,
    beat_key: &str,
    token: &str,
    ttl: Duration,
) -> crate::cache::Result<()> {
    let record = Heartbeat::new(token, chrono::Utc::now().timestamp_millis());
    store.set(beat_key, &record.encode(), ttl).await
}

/// Background task refreshing the leader's heartbeat. Aborted on drop.
struct HeartbeatHandle {
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    fn spawn(
        store: Arc<dyn CacheStore>,
        beat_key: String,
        token: String,
        interval: Duration,
        ttl: Duration,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = beat(store.as_ref(), &beat_key, &token, ttl).await {
                    tracing::warn!(heartbeat_key = %beat_key, error = %err, "Failed to refresh heartbeat");
                }
            }
        });
        Self { task }
    }

    fn stop(self) {
        drop(self);
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
