use std::time::Duration;

use async_trait::async_trait;

use ratecache_core::producer::{ProducerError, ValueProducer};

use super::client::{select_rate, RateApiClient};
use super::error::ClientError;
use super::RateRequest;

/// Produces room rates from the upstream rate API.
#[derive(Debug, Clone)]
pub struct RateProducer {
    client: RateApiClient,
}

impl RateProducer {
    pub fn new(client: RateApiClient) -> Self {
        Self { client }
    }
}

fn producer_error(err: ClientError, timeout: Duration) -> ProducerError {
    if err.is_timeout() {
        return ProducerError::Timeout(timeout);
    }
    match err {
        ClientError::ServerError { message, .. } => {
            ProducerError::Failure(format!("API Error: {}", message))
        }
        other => ProducerError::Failure(other.to_string()),
    }
}

#[async_trait]
impl ValueProducer for RateProducer {
    type Request = RateRequest;
    type Value = f64;

    async fn fetch(&self, request: &RateRequest, timeout: Duration) -> Result<f64, ProducerError> {
        tracing::debug!(
            hotel = %request.hotel,
            room = %request.room,
            period = %request.period,
            "Requesting rate from API"
        );
        let response = self
            .client
            .get_rates(request, timeout)
            .await
            .map_err(|err| producer_error(err, timeout))?;

        select_rate(&response, request).ok_or_else(|| {
            ProducerError::ValueNotFound(format!(
                "Rate missing in API response for {}",
                request.cache_key()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request() -> RateRequest {
        RateRequest::new("Summer", "FloatingPointResort", "SingletonRoom")
    }

    #[tokio::test]
    async fn test_fetch_returns_matching_rate() {
        let router = Router::new().route(
            "/rates",
            get(|| async {
                Json(serde_json::json!({"rates": [
                    {"period": "Summer", "hotel": "FloatingPointResort", "room": "SingletonRoom", "rate": 200.0}
                ]}))
            }),
        );
        let producer = RateProducer::new(RateApiClient::new(spawn_upstream(router).await));

        let rate = producer
            .fetch(&request(), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(rate, 200.0);
    }

    #[tokio::test]
    async fn test_fetch_missing_rate_is_value_not_found() {
        let router = Router::new().route(
            "/rates",
            get(|| async { Json(serde_json::json!({"rates": []})) }),
        );
        let producer = RateProducer::new(RateApiClient::new(spawn_upstream(router).await));

        let err = producer
            .fetch(&request(), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProducerError::ValueNotFound(
                "Rate missing in API response for rate:FloatingPointResort:SingletonRoom:Summer"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_failure() {
        let router = Router::new().route(
            "/rates",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
        );
        let producer = RateProducer::new(RateApiClient::new(spawn_upstream(router).await));

        let err = producer
            .fetch(&request(), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProducerError::Failure("API Error: upstream exploded".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let router = Router::new().route(
            "/rates",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(serde_json::json!({"rates": []}))
            }),
        );
        let producer = RateProducer::new(RateApiClient::new(spawn_upstream(router).await));

        let err = producer
            .fetch(&request(), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert_eq!(err, ProducerError::Timeout(Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_upstream_is_failure() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let producer = RateProducer::new(RateApiClient::new(format!("http://{}", addr)));

        let err = producer
            .fetch(&request(), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ProducerError::Failure(_)));
    }
}
