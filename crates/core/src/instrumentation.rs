//! Events emitted by the coordinator for metrics and alerting.

use std::fmt;

use thiserror::Error;

use crate::cache::CacheKey;

/// What happened on the read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Hit,
    Miss,
    Retry,
    /// The producer failed after every retry.
    Failure,
    /// Coordination was abandoned and the value fetched directly.
    Fallback,
    /// A follower declared the leader dead and cleared its lock.
    Takeover,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Hit,
        EventKind::Miss,
        EventKind::Retry,
        EventKind::Failure,
        EventKind::Fallback,
        EventKind::Takeover,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Hit => "cache_hit",
            EventKind::Miss => "cache_miss",
            EventKind::Retry => "retry",
            EventKind::Failure => "failure",
            EventKind::Fallback => "fallback",
            EventKind::Takeover => "takeover",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single instrumentation event, tagged with the key's dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEvent {
    pub kind: EventKind,
    pub key: String,
    pub tags: Vec<(String, String)>,
    pub detail: Option<String>,
}

impl CacheEvent {
    pub fn new(kind: EventKind, key: &CacheKey) -> Self {
        Self {
            kind,
            key: key.as_str().to_string(),
            tags: key.dimensions().to_vec(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Looks up a tag by name.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Instrumentation sink failed: {0}")]
pub struct SinkError(pub String);

/// Receives events from the coordinator.
///
/// `emit` is called inline on the read path and must return quickly. Errors
/// are logged by the caller and otherwise ignored.
pub trait InstrumentationSink: Send + Sync {
    fn emit(&self, event: &CacheEvent) -> Result<(), SinkError>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl InstrumentationSink for NoopSink {
    fn emit(&self, _event: &CacheEvent) -> Result<(), SinkError> {
        Ok(())
    }
}
