//! The fallible upstream that produces values on a cache miss.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors returned by a [`ValueProducer`].
///
/// All variants are retried the same way. Only the last one seen after the
/// retry budget is spent reaches the caller, wrapped in a user-safe error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProducerError {
    #[error("Producer timed out after {0:?}")]
    Timeout(Duration),
    #[error("Producer failed: {0}")]
    Failure(String),
    /// The upstream answered successfully but did not contain the requested
    /// value.
    #[error("Value not found: {0}")]
    ValueNotFound(String),
}

/// Produces the value for a request when it is not cached.
///
/// Calling `fetch` twice for the same request must be safe; the coordinator
/// falls back to uncoordinated fetches when the store misbehaves.
#[async_trait]
pub trait ValueProducer: Send + Sync + 'static {
    type Request: Send + Sync;
    type Value: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Fetches the value, giving up after `timeout`.
    async fn fetch(
        &self,
        request: &Self::Request,
        timeout: Duration,
    ) -> Result<Self::Value, ProducerError>;
}
