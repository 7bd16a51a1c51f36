//! HTTP client for the upstream rate API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{ClientError, Result};
use super::RateRequest;

/// One rate as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub period: String,
    pub hotel: String,
    pub room: String,
    #[serde(default)]
    pub rate: Option<f64>,
}

/// Body of `GET /rates`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatesResponse {
    #[serde(default)]
    pub rates: Vec<RateRecord>,
}

/// Picks the rate for `request` out of a response.
///
/// The API may answer with rates for other combinations; only an exact match
/// on period, hotel and room counts. The first match wins.
pub fn select_rate(response: &RatesResponse, request: &RateRequest) -> Option<f64> {
    response
        .rates
        .iter()
        .find(|r| r.period == request.period && r.hotel == request.hotel && r.room == request.room)
        .and_then(|r| r.rate)
}

/// HTTP client for the rate API.
#[derive(Debug, Clone)]
pub struct RateApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl RateApiClient {
    /// Create a new client with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetches rates for a request, giving up after `timeout`.
    pub async fn get_rates(&self, request: &RateRequest, timeout: Duration) -> Result<RatesResponse> {
        let response = self
            .client
            .get(self.url("/rates"))
            .query(&[
                ("period", request.period.as_str()),
                ("hotel", request.hotel.as_str()),
                ("room", request.room.as_str()),
            ])
            .timeout(timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Handle error responses.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(ClientError::from)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(ClientError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};

    fn summer_request() -> RateRequest {
        RateRequest::new("Summer", "FloatingPointResort", "SingletonRoom")
    }

    fn record(period: &str, hotel: &str, room: &str, rate: Option<f64>) -> RateRecord {
        RateRecord {
            period: period.to_string(),
            hotel: hotel.to_string(),
            room: room.to_string(),
            rate,
        }
    }

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_select_rate_exact_match() {
        let response = RatesResponse {
            rates: vec![
                record("Winter", "FloatingPointResort", "SingletonRoom", Some(150.0)),
                record("Summer", "FloatingPointResort", "SingletonRoom", Some(200.0)),
                record("Summer", "FloatingPointResort", "SingletonRoom", Some(999.0)),
            ],
        };
        assert_eq!(select_rate(&response, &summer_request()), Some(200.0));
    }

    #[test]
    fn test_select_rate_missing() {
        let response = RatesResponse {
            rates: vec![record("Summer", "GitawayHotel", "SingletonRoom", Some(120.0))],
        };
        assert_eq!(select_rate(&response, &summer_request()), None);
        assert_eq!(select_rate(&RatesResponse::default(), &summer_request()), None);
    }

    #[test]
    fn test_select_rate_match_without_rate() {
        let response = RatesResponse {
            rates: vec![record("Summer", "FloatingPointResort", "SingletonRoom", None)],
        };
        assert_eq!(select_rate(&response, &summer_request()), None);
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let response: RatesResponse = serde_json::from_str("{}").unwrap();
        assert!(response.rates.is_empty());

        let response: RatesResponse = serde_json::from_str(
            r#"{"rates":[{"period":"Summer","hotel":"FloatingPointResort","room":"SingletonRoom"}]}"#,
        )
        .unwrap();
        assert_eq!(response.rates[0].rate, None);
    }

    #[tokio::test]
    async fn test_get_rates_sends_query() {
        let router = Router::new().route(
            "/rates",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(serde_json::json!({
                    "rates": [{
                        "period": params["period"],
                        "hotel": params["hotel"],
                        "room": params["room"],
                        "rate": 200.0
                    }]
                }))
            }),
        );
        let client = RateApiClient::new(spawn_upstream(router).await);

        let response = client
            .get_rates(&summer_request(), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(select_rate(&response, &summer_request()), Some(200.0));
    }

    #[tokio::test]
    async fn test_get_rates_server_error() {
        let router = Router::new().route(
            "/rates",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database down") }),
        );
        let client = RateApiClient::new(spawn_upstream(router).await);

        let err = client
            .get_rates(&summer_request(), Duration::from_secs(2))
            .await
            .unwrap_err();

        match err {
            ClientError::ServerError { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "database down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_get_rates_timeout() {
        let router = Router::new().route(
            "/rates",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(RatesResponse::default())
            }),
        );
        let client = RateApiClient::new(spawn_upstream(router).await);

        let err = client
            .get_rates(&summer_request(), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = RateApiClient::new("http://localhost:4000/");
        assert_eq!(client.base_url(), "http://localhost:4000");
        assert_eq!(client.url("/rates"), "http://localhost:4000/rates");
    }
}
