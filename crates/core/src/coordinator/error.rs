use std::time::Duration;

use thiserror::Error;

use crate::producer::ProducerError;

/// Rejected [`CoordinatorConfig`](super::CoordinatorConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("max_lock_attempts must be at least 1")]
    NoLockAttempts,
    #[error("lock_ttl ({lock_ttl:?}) must exceed the worst-case retrying fetch ({worst_case:?})")]
    LockTtlTooShort {
        lock_ttl: Duration,
        worst_case: Duration,
    },
    #[error("{field} ({value:?}) must exceed heartbeat_interval ({interval:?})")]
    HeartbeatTooSlow {
        field: &'static str,
        value: Duration,
        interval: Duration,
    },
}

/// Terminal failure returned from [`Coordinator::get`](super::Coordinator::get).
///
/// Displays only the user-safe message. The producer error that caused it is
/// available through [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{message}")]
    Unavailable {
        message: String,
        #[source]
        cause: ProducerError,
    },
}

impl CoordinatorError {
    pub fn cause(&self) -> &ProducerError {
        match self {
            CoordinatorError::Unavailable { cause, .. } => cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_unavailable_displays_user_message_only() {
        let err = CoordinatorError::Unavailable {
            message: "Please retry later.".to_string(),
            cause: ProducerError::Failure("connection reset".to_string()),
        };
        assert_eq!(err.to_string(), "Please retry later.");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("Producer failed: connection reset".to_string())
        );
        assert!(matches!(err.cause(), ProducerError::Failure(_)));
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::ZeroDuration("lock_ttl").to_string(),
            "lock_ttl must be greater than zero"
        );
    }
}
