//! HTTP client layer: one resilient transport for the whole run.
//!
//! The client is built once at startup and passed by reference into the
//! fetcher and downloader; nothing mutates it afterwards. GET requests
//! against the search API retry transient failures per endpoint with
//! exponential backoff, then fail over to the next configured endpoint.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{ConfigError, FetchError};

/// Build the shared `reqwest` client from transport configuration.
///
/// An explicit proxy takes precedence; otherwise ambient environment
/// proxies are honored or stripped per `respect_env_proxies`.
pub fn build_http_client(config: &ApiConfig) -> Result<reqwest::Client, ConfigError> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.read_timeout_secs))
        .user_agent(config.user_agent.clone());

    if let Some(url) = &config.proxy_url {
        let proxy = reqwest::Proxy::all(url).map_err(|e| ConfigError::HttpClient {
            message: format!("invalid proxy url {url}: {e}"),
        })?;
        builder = builder.proxy(proxy);
    } else if !config.respect_env_proxies {
        builder = builder.no_proxy();
    }

    builder.build().map_err(|e| ConfigError::HttpClient {
        message: e.to_string(),
    })
}

/// Client for the upstream search API with retry and endpoint failover.
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Vec<String>,
    retry_total: u32,
    retry_backoff: Duration,
    endpoint_pause: Duration,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http: build_http_client(config)?,
            endpoints: config.endpoints.clone(),
            retry_total: config.retry_total,
            retry_backoff: Duration::from_secs_f64(config.retry_backoff_secs.max(0.0)),
            endpoint_pause: Duration::from_millis(config.endpoint_pause_ms),
        })
    }

    /// A handle to the underlying transport, for non-API downloads.
    /// `reqwest::Client` clones share one connection pool.
    pub fn http(&self) -> reqwest::Client {
        self.http.clone()
    }

    /// GET the search API, trying each endpoint in order.
    ///
    /// Returns the response body of the first endpoint that succeeds. When
    /// every endpoint fails, the most recent error is surfaced inside
    /// [`FetchError::EndpointsExhausted`].
    pub async fn get_feed(&self, params: &[(&str, String)]) -> Result<String, FetchError> {
        let mut last_error: Option<FetchError> = None;

        for endpoint in &self.endpoints {
            match self.get_with_retries(endpoint, params).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "endpoint failed, trying next");
                    last_error = Some(e);
                    tokio::time::sleep(self.endpoint_pause).await;
                }
            }
        }

        Err(FetchError::EndpointsExhausted {
            tried: self.endpoints.len(),
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no endpoints configured".to_string()),
        })
    }

    /// One endpoint: up to `retry_total` retries with exponential backoff
    /// on transient failures; any other failure ends the endpoint at once.
    async fn get_with_retries(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<String, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            match self.get_once(endpoint, params).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.retry_total => {
                    let delay = self.retry_backoff.mul_f64(f64::from(1u32 << attempt.min(16)));
                    debug!(
                        endpoint = %endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<String, FetchError> {
        let response = self
            .http
            .get(endpoint)
            .query(params)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Request {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn test_config(endpoints: Vec<String>, retry_total: u32) -> ApiConfig {
        ApiConfig {
            endpoints,
            retry_total,
            retry_backoff_secs: 0.0,
            endpoint_pause_ms: 0,
            ..ApiConfig::default()
        }
    }

    fn params() -> Vec<(&'static str, String)> {
        vec![("search_query", "cat:cs.*".to_string())]
    }

    #[tokio::test]
    async fn test_transient_failure_retries_then_fails_over() {
        let mut primary = mockito::Server::new_async().await;
        let mut secondary = mockito::Server::new_async().await;

        // retry_total = 2 means three attempts against the primary.
        let primary_mock = primary
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(3)
            .create_async()
            .await;
        let secondary_mock = secondary
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<feed></feed>")
            .expect(1)
            .create_async()
            .await;

        let config = test_config(
            vec![
                format!("{}/api/query", primary.url()),
                format!("{}/api/query", secondary.url()),
            ],
            2,
        );
        let client = ApiClient::new(&config).unwrap();

        let body = client.get_feed(&params()).await.unwrap();
        assert_eq!(body, "<feed></feed>");
        primary_mock.assert_async().await;
        secondary_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_transient_status_fails_endpoint_immediately() {
        let mut primary = mockito::Server::new_async().await;
        let mut secondary = mockito::Server::new_async().await;

        let primary_mock = primary
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(400)
            .expect(1)
            .create_async()
            .await;
        let secondary_mock = secondary
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("ok")
            .expect(1)
            .create_async()
            .await;

        let config = test_config(
            vec![
                format!("{}/api/query", primary.url()),
                format!("{}/api/query", secondary.url()),
            ],
            5,
        );
        let client = ApiClient::new(&config).unwrap();

        let body = client.get_feed(&params()).await.unwrap();
        assert_eq!(body, "ok");
        primary_mock.assert_async().await;
        secondary_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_all_endpoints_exhausted_surfaces_last_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let config = test_config(vec![format!("{}/api/query", server.url())], 1);
        let client = ApiClient::new(&config).unwrap();

        let err = client.get_feed(&params()).await.unwrap_err();
        match err {
            FetchError::EndpointsExhausted { tried, last } => {
                assert_eq!(tried, 1);
                assert!(last.contains("500"), "last error was: {last}");
            }
            other => panic!("expected EndpointsExhausted, got {other}"),
        }
    }
}
