use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use super::Coordinator;
use crate::cache::{heartbeat_key, updates_channel, CacheError, CacheKey, Heartbeat};
use crate::instrumentation::{CacheEvent, EventKind};
use crate::producer::ValueProducer;

pub(super) enum FollowOutcome<V> {
    Value(V),
    /// The lock disappeared without a value showing up.
    LockReleased,
    /// The leader was declared dead and its lock removed.
    TookOver,
    DeadlineExceeded,
    StoreUnavailable(CacheError),
}

/// Liveness observations for the lock owner a follower is waiting on.
struct LeaderWatch {
    token: Vec<u8>,
    last_alive: Instant,
}

impl LeaderWatch {
    fn new(now: Instant) -> Self {
        Self {
            token: Vec::new(),
            last_alive: now,
        }
    }

    /// Records the current lock owner. A newly observed owner gets the full
    /// staleness window before it can be declared dead.
    fn observe(&mut self, token: &[u8], now: Instant) {
        if self.token != token {
            self.token = token.to_vec();
            self.last_alive = now;
        }
    }
}

impl<P: ValueProducer> Coordinator<P> {
    /// Follower branch: waits for the leader's value, the lock to go away, or
    /// the leader to stop heartbeating.
    pub(super) async fn follow(
        &self,
        key: &CacheKey,
        lock: &str,
        deadline: Instant,
    ) -> FollowOutcome<P::Value> {
        let mut updates = match self.channel.subscribe(&updates_channel(key.as_str())).await {
            Ok(receiver) => Some(receiver),
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Subscribe failed, polling only");
                None
            }
        };
        let mut watch = LeaderWatch::new(Instant::now());

        loop {
            match self.read_cached(key).await {
                Ok(Some(value)) => {
                    tracing::trace!(cache_key = %key, "Leader value received");
                    self.emit(CacheEvent::new(EventKind::Hit, key));
                    return FollowOutcome::Value(value);
                }
                Ok(None) => {}
                Err(err) => return FollowOutcome::StoreUnavailable(err),
            }

            let now = Instant::now();
            if now >= deadline {
                return FollowOutcome::DeadlineExceeded;
            }

            let holder = match self.store.get(lock).await {
                Ok(Some(holder)) => holder,
                Ok(None) => return FollowOutcome::LockReleased,
                Err(err) => return FollowOutcome::StoreUnavailable(err),
            };

            if self.config.heartbeat {
                watch.observe(&holder, now);
                match self.leader_is_dead(key, &mut watch, now).await {
                    Ok(false) => {}
                    Ok(true) => return self.take_over(key, lock, &holder).await,
                    Err(err) => return FollowOutcome::StoreUnavailable(err),
                }
            }

            let wait = self
                .config
                .poll_interval
                .min(deadline.saturating_duration_since(now));
            wait_for_update(&mut updates, wait).await;
        }
    }

    async fn leader_is_dead(
        &self,
        key: &CacheKey,
        watch: &mut LeaderWatch,
        now: Instant,
    ) -> Result<bool, CacheError> {
        let stale_after = self.config.heartbeat_stale_after;
        let beat = self
            .store
            .get(&heartbeat_key(key.as_str()))
            .await?
            .and_then(|bytes| Heartbeat::decode(&bytes))
            .filter(|beat| beat.token.as_bytes() == watch.token.as_slice());

        if let Some(beat) = beat {
            let age_ms = beat.age_ms(chrono::Utc::now().timestamp_millis());
            let age = Duration::from_millis(u64::try_from(age_ms).unwrap_or_default());
            if age > stale_after {
                tracing::debug!(cache_key = %key, age_ms, "Leader heartbeat is stale");
                return Ok(true);
            }
            watch.last_alive = now;
            return Ok(false);
        }

        Ok(now.saturating_duration_since(watch.last_alive) > stale_after)
    }

    async fn take_over(&self, key: &CacheKey, lock: &str, holder: &[u8]) -> FollowOutcome<P::Value> {
        match self.store.compare_and_delete(lock, holder).await {
            Ok(true) => {
                tracing::warn!(cache_key = %key, "Leader stopped heartbeating, taking over");
                self.emit(CacheEvent::new(EventKind::Takeover, key));
                FollowOutcome::TookOver
            }
            // Someone else replaced the lock first.
            Ok(false) => FollowOutcome::LockReleased,
            Err(err) => FollowOutcome::StoreUnavailable(err),
        }
    }
}

/// Waits for a message on the updates channel or for `wait` to pass.
async fn wait_for_update(updates: &mut Option<broadcast::Receiver<String>>, wait: Duration) {
    let Some(receiver) = updates.as_mut() else {
        tokio::time::sleep(wait).await;
        return;
    };

    match tokio::time::timeout(wait, receiver.recv()).await {
        Ok(Ok(message)) => tracing::trace!(message = %message, "Update received"),
        Ok(Err(RecvError::Lagged(_))) | Err(_) => {}
        Ok(Err(RecvError::Closed)) => {
            *updates = None;
            tokio::time::sleep(wait).await;
        }
    }
}
