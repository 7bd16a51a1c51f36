use std::{env, time::Duration};

use ratecache_core::coordinator::CoordinatorConfig;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the rate API (default: "http://localhost:4000")
    pub rate_api_url: String,
    /// Redis connection URL. The in-memory backend is used when unset.
    pub redis_url: Option<String>,
    /// Maximum number of entries in the in-memory backend (default: 10,000)
    pub cache_max_entries: usize,
    /// Cache TTL in seconds (default: 300)
    pub cache_ttl_seconds: u64,
    /// Lock TTL in seconds (default: 15)
    pub lock_ttl_seconds: u64,
    pub producer_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub overall_deadline_ms: u64,
    pub poll_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_stale_ms: u64,
    pub heartbeat_ttl_ms: u64,
    pub max_lock_attempts: u32,
    pub coalescing: bool,
    pub heartbeat: bool,
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Accepts `true`/`false`, `1`/`0`, `yes`/`no` and `on`/`off`.
fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => false,
        _ => default,
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RATE_API_URL` - Rate API base URL (default: "http://localhost:4000")
    /// - `REDIS_URL` - Redis connection URL (default: unset, in-memory backend)
    /// - `CACHE_MAX_ENTRIES` - Maximum in-memory entries (default: 10,000)
    /// - `CACHE_TTL_SECONDS` - Cached rate TTL (default: 300)
    /// - `LOCK_TTL_SECONDS` - Per-key lock TTL (default: 15)
    /// - `PRODUCER_TIMEOUT_MS` - Rate API per-attempt timeout (default: 5,000)
    /// - `MAX_RETRIES` - Retries after the first attempt (default: 1)
    /// - `RETRY_BACKOFF_MS` - Pause before each retry (default: 0)
    /// - `OVERALL_DEADLINE_MS` - Coordination deadline (default: 10,000)
    /// - `POLL_INTERVAL_MS` - Follower poll interval (default: 100)
    /// - `HEARTBEAT_INTERVAL_MS` - Leader heartbeat interval (default: 1,000)
    /// - `HEARTBEAT_STALE_MS` - Heartbeat age that marks a dead leader (default: 3,000)
    /// - `HEARTBEAT_TTL_MS` - Heartbeat key TTL (default: 5,000)
    /// - `MAX_LOCK_ATTEMPTS` - Lock acquisitions before fetching directly (default: 5)
    /// - `CACHE_COALESCING` - Enable request coalescing (default: true)
    /// - `CACHE_HEARTBEAT` - Enable leader heartbeats (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = CoordinatorConfig::default();
        Self {
            rate_api_url: lookup("RATE_API_URL")
                .unwrap_or_else(|| "http://localhost:4000".to_string()),
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            cache_max_entries: parse_or(lookup("CACHE_MAX_ENTRIES"), 10_000),
            cache_ttl_seconds: parse_or(lookup("CACHE_TTL_SECONDS"), defaults.entry_ttl.as_secs()),
            lock_ttl_seconds: parse_or(lookup("LOCK_TTL_SECONDS"), defaults.lock_ttl.as_secs()),
            producer_timeout_ms: parse_or(
                lookup("PRODUCER_TIMEOUT_MS"),
                millis(defaults.producer_timeout),
            ),
            max_retries: parse_or(lookup("MAX_RETRIES"), defaults.max_retries),
            retry_backoff_ms: parse_or(lookup("RETRY_BACKOFF_MS"), millis(defaults.retry_backoff)),
            overall_deadline_ms: parse_or(
                lookup("OVERALL_DEADLINE_MS"),
                millis(defaults.overall_deadline),
            ),
            poll_interval_ms: parse_or(lookup("POLL_INTERVAL_MS"), millis(defaults.poll_interval)),
            heartbeat_interval_ms: parse_or(
                lookup("HEARTBEAT_INTERVAL_MS"),
                millis(defaults.heartbeat_interval),
            ),
            heartbeat_stale_ms: parse_or(
                lookup("HEARTBEAT_STALE_MS"),
                millis(defaults.heartbeat_stale_after),
            ),
            heartbeat_ttl_ms: parse_or(lookup("HEARTBEAT_TTL_MS"), millis(defaults.heartbeat_ttl)),
            max_lock_attempts: parse_or(lookup("MAX_LOCK_ATTEMPTS"), defaults.max_lock_attempts),
            coalescing: parse_flag(lookup("CACHE_COALESCING"), defaults.coalescing),
            heartbeat: parse_flag(lookup("CACHE_HEARTBEAT"), defaults.heartbeat),
        }
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Coordinator tuning derived from this configuration.
    ///
    /// The result is not validated here; `Coordinator::new` does that.
    pub fn to_coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            entry_ttl: self.cache_ttl(),
            lock_ttl: Duration::from_secs(self.lock_ttl_seconds),
            producer_timeout: Duration::from_millis(self.producer_timeout_ms),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            overall_deadline: Duration::from_millis(self.overall_deadline_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            heartbeat_stale_after: Duration::from_millis(self.heartbeat_stale_ms),
            heartbeat_ttl: Duration::from_millis(self.heartbeat_ttl_ms),
            max_lock_attempts: self.max_lock_attempts,
            coalescing: self.coalescing,
            heartbeat: self.heartbeat,
            ..CoordinatorConfig::default()
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
