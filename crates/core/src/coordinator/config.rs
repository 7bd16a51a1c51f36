use std::time::Duration;

use super::ConfigError;

/// Tuning for a [`Coordinator`](super::Coordinator).
///
/// `coalescing` and `heartbeat` switch the lock-based stampede protection and
/// the leader liveness detection on and off independently. With coalescing off
/// every miss fetches directly; with heartbeats off followers wait for the
/// leader's lock to be released or to expire.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Expiry of cached values.
    pub entry_ttl: Duration,
    /// Expiry of the per-key lock. Must outlast a full retrying fetch.
    pub lock_ttl: Duration,
    /// Per-attempt bound on the producer.
    pub producer_timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Pause before each retry, jittered by up to half in either direction.
    pub retry_backoff: Duration,
    /// Longest a call coordinates before fetching directly.
    pub overall_deadline: Duration,
    /// Follower cache re-read interval.
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    /// Age after which a leader's heartbeat means it is dead.
    pub heartbeat_stale_after: Duration,
    pub heartbeat_ttl: Duration,
    /// Lock acquisitions tried before fetching directly.
    pub max_lock_attempts: u32,
    pub coalescing: bool,
    pub heartbeat: bool,
    /// Message surfaced to callers when the producer keeps failing.
    pub failure_message: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(5 * 60),
            lock_ttl: Duration::from_secs(15),
            producer_timeout: Duration::from_secs(5),
            max_retries: 1,
            retry_backoff: Duration::ZERO,
            overall_deadline: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            heartbeat_interval: Duration::from_secs(1),
            heartbeat_stale_after: Duration::from_secs(3),
            heartbeat_ttl: Duration::from_secs(5),
            max_lock_attempts: 5,
            coalescing: true,
            heartbeat: true,
            failure_message: "Service unavailable. Please retry later.".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Upper bound on how long a leader can spend fetching with retries.
    ///
    /// Saturates at `Duration::MAX`.
    pub fn worst_case_fetch(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        let max_backoff = Duration::try_from_secs_f64(self.retry_backoff.as_secs_f64() * 1.5)
            .unwrap_or(Duration::MAX);
        max_backoff
            .checked_mul(self.max_retries)
            .and_then(|backoff| {
                self.producer_timeout
                    .checked_mul(attempts)?
                    .checked_add(backoff)
            })
            .unwrap_or(Duration::MAX)
    }

    /// Checks the invariants the lock protocol depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("entry_ttl", self.entry_ttl),
            ("lock_ttl", self.lock_ttl),
            ("producer_timeout", self.producer_timeout),
            ("overall_deadline", self.overall_deadline),
            ("poll_interval", self.poll_interval),
            ("heartbeat_interval", self.heartbeat_interval),
            ("heartbeat_stale_after", self.heartbeat_stale_after),
            ("heartbeat_ttl", self.heartbeat_ttl),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        if self.max_lock_attempts == 0 {
            return Err(ConfigError::NoLockAttempts);
        }

        let worst_case = self.worst_case_fetch();
        if self.lock_ttl <= worst_case {
            return Err(ConfigError::LockTtlTooShort {
                lock_ttl: self.lock_ttl,
                worst_case,
            });
        }

        if self.heartbeat {
            if self.heartbeat_stale_after <= self.heartbeat_interval {
                return Err(ConfigError::HeartbeatTooSlow {
                    field: "heartbeat_stale_after",
                    value: self.heartbeat_stale_after,
                    interval: self.heartbeat_interval,
                });
            }
            if self.heartbeat_ttl <= self.heartbeat_interval {
                return Err(ConfigError::HeartbeatTooSlow {
                    field: "heartbeat_ttl",
                    value: self.heartbeat_ttl,
                    interval: self.heartbeat_interval,
                });
            }
        }

        Ok(())
    }
}
