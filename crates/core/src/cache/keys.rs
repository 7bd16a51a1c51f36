use std::fmt;

/// Identifies one cacheable unit of work.
///
/// The key string is built from a namespace followed by the values of its
/// dimensions, in insertion order, joined with `:`. Identical logical requests
/// therefore always produce identical keys as long as callers add dimensions
/// in a fixed order. The dimensions are kept alongside the key so that
/// instrumentation can tag events with them.
///
/// # Examples
///
/// ```
/// use ratecache_core::cache::CacheKey;
///
/// let key = CacheKey::new("rate")
///     .with_dimension("hotel", "magnificent-resort")
///     .with_dimension("room", "1-king-bed")
///     .with_dimension("period", "2024-10-28");
///
/// assert_eq!(key.as_str(), "rate:magnificent-resort:1-king-bed:2024-10-28");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
    dimensions: Vec<(String, String)>,
}

impl CacheKey {
    /// Creates a key with only a namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            key: namespace.into(),
            dimensions: Vec::new(),
        }
    }

    /// Appends a dimension to the key.
    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        self.key.push(':');
        self.key.push_str(&value);
        self.dimensions.push((name.into(), value));
        self
    }

    /// The full key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The logical dimensions the key was derived from.
    pub fn dimensions(&self) -> &[(String, String)] {
        &self.dimensions
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Returns the lock key guarding production of `key`.
pub fn lock_key(key: &str) -> String {
    format!("lock:{}", key)
}

/// Returns the key the current lock holder refreshes while it works.
pub fn heartbeat_key(key: &str) -> String {
    format!("heartbeat:{}", key)
}

/// Returns the pub/sub channel announcing that `key` has been resolved.
pub fn updates_channel(key: &str) -> String {
    format!("updates:{}", key)
}

/// Liveness record written under [`heartbeat_key`].
///
/// Stored as `<owner token>:<unix millis>`. The owner token ties the beat to a
/// specific lock acquisition, so a follower never mistakes a new leader's
/// heartbeat for the old one's or the other way around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub token: String,
    pub beat_at_ms: i64,
}

impl Heartbeat {
    pub fn new(token: impl Into<String>, beat_at_ms: i64) -> Self {
        Self {
            token: token.into(),
            beat_at_ms,
        }
    }

    /// Encodes the record for storage.
    pub fn encode(&self) -> Vec<u8> {
        format!("{}:{}", self.token, self.beat_at_ms).into_bytes()
    }

    /// Decodes a stored record. Returns `None` for anything malformed.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let raw = std::str::from_utf8(bytes).ok()?;
        let (token, millis) = raw.rsplit_once(':')?;
        if token.is_empty() {
            return None;
        }
        let beat_at_ms = millis.parse().ok()?;
        Some(Self::new(token, beat_at_ms))
    }

    /// Milliseconds elapsed between this beat and `now_ms`, never negative.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.beat_at_ms).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_key() -> CacheKey {
        CacheKey::new("rate")
            .with_dimension("hotel", "magnificent-resort")
            .with_dimension("room", "1-king-bed")
            .with_dimension("period", "2024-10-28")
    }

    #[test]
    fn test_key_is_deterministic() {
        assert_eq!(rate_key(), rate_key());
        assert_eq!(
            rate_key().to_string(),
            "rate:magnificent-resort:1-king-bed:2024-10-28"
        );
    }

    #[test]
    fn test_dimensions_keep_insertion_order() {
        let key = rate_key();
        let names: Vec<&str> = key.dimensions().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["hotel", "room", "period"]);
    }

    #[test]
    fn test_namespace_only_key() {
        let key = CacheKey::new("config");
        assert_eq!(key.as_str(), "config");
        assert!(key.dimensions().is_empty());
    }

    #[test]
    fn test_derived_keys() {
        assert_eq!(lock_key("rate:a:b:c"), "lock:rate:a:b:c");
        assert_eq!(heartbeat_key("rate:a:b:c"), "heartbeat:rate:a:b:c");
        assert_eq!(updates_channel("rate:a:b:c"), "updates:rate:a:b:c");
    }

    #[test]
    fn test_heartbeat_encoding() {
        let beat = Heartbeat::new("5f0c7a1e-token", 1_730_000_000_123);
        assert_eq!(beat.encode(), b"5f0c7a1e-token:1730000000123".to_vec());
        assert_eq!(Heartbeat::decode(&beat.encode()), Some(beat));
    }

    #[test]
    fn test_heartbeat_decode_rejects_garbage() {
        assert_eq!(Heartbeat::decode(b"no-separator"), None);
        assert_eq!(Heartbeat::decode(b"token:not-a-number"), None);
        assert_eq!(Heartbeat::decode(b":123"), None);
        assert_eq!(Heartbeat::decode(&[0xff, 0xfe]), None);
    }

    #[test]
    fn test_heartbeat_age_never_negative() {
        let beat = Heartbeat::new("t", 2_000);
        assert_eq!(beat.age_ms(5_000), 3_000);
        assert_eq!(beat.age_ms(1_000), 0);
    }
}
