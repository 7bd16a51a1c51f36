//! Instrumentation sinks: alert log lines, in-process counters, and fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use ratecache_core::instrumentation::{CacheEvent, EventKind, InstrumentationSink, SinkError};

/// Alert label used in log lines for each event kind.
pub fn alert_type(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Hit => "CACHE_HIT",
        EventKind::Miss => "CACHE_MISS",
        EventKind::Retry => "API_RETRY",
        EventKind::Failure => "API_ERROR",
        EventKind::Fallback => "CACHE_FALLBACK",
        EventKind::Takeover => "LEADER_TAKEOVER",
    }
}

/// Renders the `[ALERT] [TYPE] message` line for an event.
pub fn alert_line(event: &CacheEvent) -> String {
    let message = match event.kind {
        EventKind::Hit => format!("Served from cache for {}", event.key),
        EventKind::Miss => format!("Fetching value for {}", event.key),
        EventKind::Retry => format!("Retrying fetch for {}", event.key),
        EventKind::Failure => format!("Failed to fetch value for {}", event.key),
        EventKind::Fallback => format!("Fetching {} without coordination", event.key),
        EventKind::Takeover => format!("Took over stalled fetch for {}", event.key),
    };
    match &event.detail {
        Some(detail) => format!("[ALERT] [{}] {}: {}", alert_type(event.kind), message, detail),
        None => format!("[ALERT] [{}] {}", alert_type(event.kind), message),
    }
}

/// Writes every event as a warning-level alert line.
///
/// Stand-in for an external alerting hook; the log line is the alert.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlertSink;

impl InstrumentationSink for AlertSink {
    fn emit(&self, event: &CacheEvent) -> Result<(), SinkError> {
        tracing::warn!(
            alert = alert_type(event.kind),
            cache_key = %event.key,
            tags = ?event.tags,
            "{}",
            alert_line(event)
        );
        Ok(())
    }
}

/// Counters for each event kind.
#[derive(Debug, Default)]
pub struct MetricsSink {
    counters: [AtomicU64; EventKind::ALL.len()],
}

/// Point-in-time copy of [`MetricsSink`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub retries: u64,
    pub failures: u64,
    pub fallbacks: u64,
    pub takeovers: u64,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(kind: EventKind) -> usize {
        match kind {
            EventKind::Hit => 0,
            EventKind::Miss => 1,
            EventKind::Retry => 2,
            EventKind::Failure => 3,
            EventKind::Fallback => 4,
            EventKind::Takeover => 5,
        }
    }

    pub fn count(&self, kind: EventKind) -> u64 {
        self.counters[Self::slot(kind)].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.count(EventKind::Hit),
            misses: self.count(EventKind::Miss),
            retries: self.count(EventKind::Retry),
            failures: self.count(EventKind::Failure),
            fallbacks: self.count(EventKind::Fallback),
            takeovers: self.count(EventKind::Takeover),
        }
    }
}

impl InstrumentationSink for MetricsSink {
    fn emit(&self, event: &CacheEvent) -> Result<(), SinkError> {
        self.counters[Self::slot(event.kind)].fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Forwards each event to every inner sink.
///
/// A failing sink does not stop delivery to the rest; failures are combined
/// into one error.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn InstrumentationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn InstrumentationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl InstrumentationSink for FanoutSink {
    fn emit(&self, event: &CacheEvent) -> Result<(), SinkError> {
        let failures: Vec<String> = self
            .sinks
            .iter()
            .filter_map(|sink| sink.emit(event).err())
            .map(|err| err.0)
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SinkError(failures.join("; ")))
        }
    }
}
