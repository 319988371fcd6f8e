//! Outbound HTTP client shared by the provider adapters.
//!
//! The default policy is a single attempt per call: the aggregator reports
//! a failed calendar fetch as a per-calendar error, and the caller's next
//! poll is the retry. OAuth token-endpoint calls may opt into a small retry
//! budget since nothing downstream absorbs their transient failures.

use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;
use trellis_domain::TrellisError;

use crate::errors::InfraError;

#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Build a request on the underlying client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute a request, retrying 5xx responses and transient transport
    /// failures while the attempt budget lasts. Non-5xx responses are
    /// returned as-is; status interpretation belongs to the caller.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, TrellisError> {
        let mut attempt = 1usize;

        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| {
                    TrellisError::Internal("streaming request bodies cannot be resent".into())
                })?
                .build()
                .map_err(|err| TrellisError::from(InfraError::from(err)))?;

            debug!(attempt, method = %request.method(), url = %request.url(), "outbound request");

            match self.client.execute(request).await {
                Ok(response) if response.status().is_server_error() && attempt < self.max_attempts => {
                    debug!(attempt, status = %response.status(), "retrying server error");
                }
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.max_attempts && is_transient(&err) => {
                    debug!(attempt, error = %err, "retrying transport failure");
                }
                Err(err) => return Err(InfraError::from(err).into()),
            }

            tokio::time::sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }

    /// Exponential backoff from the base delay, doubling per retry.
    fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(8) as u32;
        self.base_backoff.saturating_mul(factor)
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 1,
            base_backoff: Duration::from_millis(200),
        }
    }
}

impl HttpClientBuilder {
    /// Per-request timeout, spanning connect through body read.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts per call. 1 means no retries.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn build(self) -> Result<HttpClient, TrellisError> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .no_proxy()
            .build()
            .map_err(|err| TrellisError::from(InfraError::from(err)))?;

        Ok(HttpClient {
            client,
            max_attempts: self.max_attempts,
            base_backoff: self.base_backoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use reqwest::StatusCode;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn default_client_surfaces_server_errors_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder().build().expect("http client");
        let url = format!("{}/calendars/primary/events", server.uri());
        let response = client.send(client.request(Method::GET, &url)).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn token_endpoint_budget_retries_transient_server_errors() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(move |_req: &wiremock::Request| {
                if hits_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200).set_body_string(r#"{"access_token":"at"}"#)
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .max_attempts(3)
            .base_backoff(Duration::from_millis(5))
            .build()
            .expect("http client");
        let url = format!("{}/token", server.uri());
        let request = client.request(Method::POST, &url).form(&[("grant_type", "refresh_token")]);
        let response = client.send(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_connections_map_to_network_errors() {
        // Bind then drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::builder().build().expect("http client");
        let result = client.send(client.request(Method::GET, format!("http://{addr}"))).await;

        assert!(matches!(result, Err(TrellisError::Network(_))));
    }

    #[tokio::test]
    async fn client_errors_never_consume_the_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .max_attempts(3)
            .base_backoff(Duration::from_millis(5))
            .build()
            .expect("http client");
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
