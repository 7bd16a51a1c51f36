//! Stampede-protected read-through caching.
//!
//! A [`Coordinator`] serves values from a shared [`CacheStore`]. On a miss
//! exactly one caller per key, across every process sharing the store, runs
//! the [`ValueProducer`] while the others wait for its result. The winner of
//! the per-key lock is the *leader*. The losers are *followers*: they wake on
//! the key's updates channel or on a poll tick, and take over when the
//! leader's heartbeat goes stale.
//!
//! Coordination is an optimisation. When the store fails, or a call has been
//! coordinating longer than the overall deadline, the value is fetched
//! directly instead.

mod config;
mod error;
mod follower;
mod lock;
mod retry;

use std::sync::Arc;

use tokio::time::Instant;

use crate::cache::{
    deserialize_value, serialize_value, CacheError, CacheKey, CacheStore, NotificationChannel,
};
use crate::instrumentation::{CacheEvent, EventKind, InstrumentationSink, NoopSink};
use crate::producer::ValueProducer;

pub use config::CoordinatorConfig;
pub use error::{ConfigError, CoordinatorError};

use lock::Coordination;

/// Read-through cache coordinator for one kind of value.
pub struct Coordinator<P: ValueProducer> {
    store: Arc<dyn CacheStore>,
    channel: Arc<dyn NotificationChannel>,
    producer: Arc<P>,
    sink: Arc<dyn InstrumentationSink>,
    config: CoordinatorConfig,
}

impl<P: ValueProducer> Clone for Coordinator<P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            channel: Arc::clone(&self.channel),
            producer: Arc::clone(&self.producer),
            sink: Arc::clone(&self.sink),
            config: self.config.clone(),
        }
    }
}

impl<P: ValueProducer> Coordinator<P> {
    /// Creates a coordinator, rejecting configurations under which a live
    /// leader could lose its lock mid-fetch.
    pub fn new(
        store: Arc<dyn CacheStore>,
        channel: Arc<dyn NotificationChannel>,
        producer: Arc<P>,
        config: CoordinatorConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            channel,
            producer,
            sink: Arc::new(NoopSink),
            config,
        })
    }

    /// Replaces the instrumentation sink.
    pub fn with_sink(mut self, sink: Arc<dyn InstrumentationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the value for `key`, producing it from `request` on a miss.
    ///
    /// Fails only when the producer keeps failing after every retry; the
    /// error then displays the configured user-safe message and nothing is
    /// cached.
    pub async fn get(
        &self,
        key: &CacheKey,
        request: &P::Request,
    ) -> Result<P::Value, CoordinatorError> {
        let deadline = Instant::now() + self.config.overall_deadline;

        match self.read_cached(key).await {
            Ok(Some(value)) => {
                tracing::trace!(cache_key = %key, "Cache hit");
                self.emit(CacheEvent::new(EventKind::Hit, key));
                return Ok(value);
            }
            Ok(None) => {}
            Err(err) => return self.degraded_fetch(key, request, &err).await,
        }

        tracing::trace!(cache_key = %key, "Cache miss");
        self.emit(CacheEvent::new(EventKind::Miss, key));

        if !self.config.coalescing {
            return self.fetch_and_cache(key, request).await;
        }

        match self.coordinate(key, request, deadline).await {
            Coordination::Resolved(result) => result,
            Coordination::StoreUnavailable(err) => self.degraded_fetch(key, request, &err).await,
            Coordination::Abandoned(reason) => {
                tracing::warn!(cache_key = %key, reason, "Abandoning coordination, fetching directly");
                self.emit(CacheEvent::new(EventKind::Fallback, key).with_detail(reason));
                self.fetch_and_cache(key, request).await
            }
        }
    }

    /// Fetches without touching the store again.
    async fn degraded_fetch(
        &self,
        key: &CacheKey,
        request: &P::Request,
        err: &CacheError,
    ) -> Result<P::Value, CoordinatorError> {
        tracing::warn!(cache_key = %key, error = %err, "Cache store unavailable, fetching directly");
        self.emit(CacheEvent::new(EventKind::Fallback, key).with_detail(err.to_string()));
        self.fetch_with_retry(key, request).await
    }

    async fn fetch_and_cache(
        &self,
        key: &CacheKey,
        request: &P::Request,
    ) -> Result<P::Value, CoordinatorError> {
        let value = self.fetch_with_retry(key, request).await?;
        self.write_through(key, &value).await;
        Ok(value)
    }

    /// Reads and decodes the cached value. Undecodable bytes count as a miss.
    async fn read_cached(&self, key: &CacheKey) -> Result<Option<P::Value>, CacheError> {
        let Some(bytes) = self.store.get(key.as_str()).await? else {
            return Ok(None);
        };
        match deserialize_value(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Ignoring undecodable cached value");
                Ok(None)
            }
        }
    }

    async fn write_through(&self, key: &CacheKey, value: &P::Value) {
        let bytes = match serialize_value(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Failed to serialize value");
                return;
            }
        };
        match self
            .store
            .set(key.as_str(), &bytes, self.config.entry_ttl)
            .await
        {
            Ok(()) => tracing::info!(cache_key = %key, "Cached fresh value"),
            Err(err) => tracing::warn!(cache_key = %key, error = %err, "Failed to cache value"),
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Err(err) = self.sink.emit(&event) {
            tracing::warn!(
                event = %event.kind,
                cache_key = %event.key,
                error = %err,
                "Failed to emit instrumentation event"
            );
        }
    }
}
