use std::time::Duration;

use rand::Rng;

use super::{Coordinator, CoordinatorError};
use crate::cache::CacheKey;
use crate::instrumentation::{CacheEvent, EventKind};
use crate::producer::{ProducerError, ValueProducer};

impl<P: ValueProducer> Coordinator<P> {
    /// Calls the producer up to `max_retries + 1` times.
    ///
    /// Each attempt is bounded by `producer_timeout` regardless of whether the
    /// producer honours the timeout it is handed. Nothing is written to the
    /// store here.
    pub(super) async fn fetch_with_retry(
        &self,
        key: &CacheKey,
        request: &P::Request,
    ) -> Result<P::Value, CoordinatorError> {
        let timeout = self.config.producer_timeout;
        let attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, self.producer.fetch(request, timeout))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ProducerError::Timeout(timeout)),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt < attempts {
                tracing::warn!(
                    cache_key = %key,
                    attempt,
                    error = %err,
                    "Producer failed, retrying"
                );
                self.emit(CacheEvent::new(EventKind::Retry, key).with_detail(err.to_string()));
                let delay = self.backoff_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                continue;
            }

            tracing::error!(
                cache_key = %key,
                attempts = attempt,
                error = %err,
                "Producer failed after all retries"
            );
            self.emit(CacheEvent::new(EventKind::Failure, key).with_detail(err.to_string()));
            return Err(CoordinatorError::Unavailable {
                message: self.config.failure_message.clone(),
                cause: err,
            });
        }
    }

    fn backoff_delay(&self) -> Duration {
        let base = self.config.retry_backoff;
        if base.is_zero() {
            return base;
        }
        base.mul_f64(rand::rng().random_range(0.5..=1.5))
    }
}
