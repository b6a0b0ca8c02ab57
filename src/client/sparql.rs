//! SPARQL endpoint client.
//!
//! One GET per query: `?format=json&query=<text>`, decoded as
//! `application/sparql-results+json`. Failures are classified but never
//! retried; the caller decides what a failed query means for the run.

use crate::client::RateLimiter;
use crate::models::{EndpointConfig, EndpointError, QueryResponse, Result, WikiventsError};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Client for one SPARQL query service.
pub struct SparqlClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    rate_limiter: Arc<RateLimiter>,
}

impl SparqlClient {
    /// Create a new client.
    pub fn new(
        endpoint: impl Into<String>,
        user_agent: &str,
        timeout_secs: u64,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(WikiventsError::Network)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
            rate_limiter: rate_limiter.unwrap_or_default(),
        })
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self> {
        Self::new(
            config.url.clone(),
            &config.user_agent,
            config.timeout_secs,
            Some(Arc::new(RateLimiter::new(Duration::from_millis(
                config.min_request_interval_ms,
            )))),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    fn send_error(&self, e: reqwest::Error) -> WikiventsError {
        if e.is_timeout() {
            EndpointError::TransientFailure {
                endpoint: self.endpoint.clone(),
                reason: format!("request timed out after {:?}", self.timeout),
            }
            .into()
        } else {
            WikiventsError::Network(e)
        }
    }

    fn status_error(&self, status: StatusCode) -> EndpointError {
        let endpoint = self.endpoint.clone();
        match status.as_u16() {
            429 => EndpointError::RateLimited { endpoint },
            443 => EndpointError::TransientFailure {
                endpoint,
                reason: "a pipe has broken (443)".to_string(),
            },
            500 => EndpointError::TransientFailure {
                endpoint,
                reason: "error 500, likely the query hit the 60 second server timeout"
                    .to_string(),
            },
            code if status.is_server_error() => EndpointError::TransientFailure {
                endpoint,
                reason: format!("server error {code}"),
            },
            _ => EndpointError::UnexpectedStatus {
                endpoint,
                status: status.to_string(),
            },
        }
    }

    /// Run one query and decode the result envelope.
    pub async fn query(&self, query: &str) -> Result<QueryResponse> {
        self.rate_limiter.wait_turn(&self.endpoint).await;
        let start = Instant::now();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "json"), ("query", query)])
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        self.rate_limiter
            .record_response(&self.endpoint, status.as_u16());

        debug!(
            status = %status,
            content_type = ?response.headers().get(CONTENT_TYPE),
            content_length = ?response.content_length(),
            "Received SPARQL response"
        );

        if !status.is_success() {
            return Err(self.status_error(status).into());
        }

        let body = response.text().await.map_err(|e| self.send_error(e))?;
        let decoded: QueryResponse =
            serde_json::from_str(&body).map_err(|source| WikiventsError::Decode {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        debug!(
            vars = ?decoded.head.vars,
            binding_count = decoded.results.bindings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Decoded SPARQL response"
        );

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> SparqlClient {
        SparqlClient::new(
            format!("{}/sparql", server.uri()),
            "wikivents-test",
            5,
            Some(Arc::new(RateLimiter::new(Duration::ZERO))),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_sends_format_and_accept() {
        let mock_server = MockServer::start().await;

        let response_json = r#"{
            "head": {"vars": ["item"]},
            "results": {"bindings": [
                {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q1"}},
                {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q2"}}
            ]}
        }"#;

        Mock::given(method("GET"))
            .and(path("/sparql"))
            .and(query_param("format", "json"))
            .and(query_param("query", "SELECT ?item WHERE { }"))
            .and(header("Accept", "application/sparql-results+json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(response_json))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let response = client.query("SELECT ?item WHERE { }").await.unwrap();

        assert_eq!(response.head.vars, vec!["item"]);
        assert_eq!(response.results.bindings.len(), 2);
        assert_eq!(client.rate_limiter().stats().total_requests, 1);
    }

    async fn status_error(status: u16) -> WikiventsError {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mock_server)
            .await;
        test_client(&mock_server).query("ASK {}").await.unwrap_err()
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert!(matches!(
            status_error(429).await,
            WikiventsError::Endpoint(EndpointError::RateLimited { .. })
        ));
        for code in [443, 500, 503] {
            assert!(matches!(
                status_error(code).await,
                WikiventsError::Endpoint(EndpointError::TransientFailure { .. })
            ));
        }
        match status_error(404).await {
            WikiventsError::Endpoint(EndpointError::UnexpectedStatus { endpoint, status }) => {
                assert!(endpoint.ends_with("/sparql"));
                assert!(status.starts_with("404"));
            }
            other => panic!("expected unexpected status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
            .mount(&mock_server)
            .await;

        let err = test_client(&mock_server).query("ASK {}").await.unwrap_err();
        assert!(matches!(err, WikiventsError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_client_timeout_is_transient() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let client = SparqlClient::new(
            format!("{}/sparql", mock_server.uri()),
            "wikivents-test",
            1,
            None,
        )
        .unwrap();
        let err = client.query("ASK {}").await.unwrap_err();
        assert!(matches!(
            err,
            WikiventsError::Endpoint(EndpointError::TransientFailure { .. })
        ));
    }
}
