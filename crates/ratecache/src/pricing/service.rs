use std::sync::Arc;

use ratecache_core::cache::{CacheStore, NotificationChannel};
use ratecache_core::coordinator::{ConfigError, Coordinator, CoordinatorConfig, CoordinatorError};
use ratecache_core::instrumentation::InstrumentationSink;

use super::client::RateApiClient;
use super::producer::RateProducer;
use super::RateRequest;

/// Shown to callers when the rate API keeps failing.
pub const UNAVAILABLE_MESSAGE: &str =
    "Pricing Service unavailable. Please retry later for the latest prices.";

/// Room rate lookups served through the shared cache.
#[derive(Clone)]
pub struct PricingService {
    coordinator: Coordinator<RateProducer>,
}

impl PricingService {
    /// Builds the service. The failure message in `config` is replaced with
    /// [`UNAVAILABLE_MESSAGE`].
    pub fn new(
        store: Arc<dyn CacheStore>,
        channel: Arc<dyn NotificationChannel>,
        client: RateApiClient,
        config: CoordinatorConfig,
    ) -> Result<Self, ConfigError> {
        let config = CoordinatorConfig {
            failure_message: UNAVAILABLE_MESSAGE.to_string(),
            ..config
        };
        let coordinator =
            Coordinator::new(store, channel, Arc::new(RateProducer::new(client)), config)?;
        Ok(Self { coordinator })
    }

    pub fn with_sink(self, sink: Arc<dyn InstrumentationSink>) -> Self {
        Self {
            coordinator: self.coordinator.with_sink(sink),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        self.coordinator.config()
    }

    /// Returns the rate for `request`, from cache when possible.
    pub async fn rate(&self, request: &RateRequest) -> Result<f64, CoordinatorError> {
        self.coordinator.get(&request.cache_key(), request).await
    }
}
