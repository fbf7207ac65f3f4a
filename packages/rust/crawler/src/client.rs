//! Retrying HTTP client shared by bootstrap and section fetches.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use storefinder_shared::{HttpConfig, Result, StoreFinderError};

/// User-Agent string for all outbound requests.
const USER_AGENT: &str = concat!("StoreFinder/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// HTTP client that retries transient failures (transport errors and 5xx).
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpClient {
    /// Build a client from the runtime HTTP configuration.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreFinderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    /// GET `url` and return the body as text.
    ///
    /// Client errors (4xx) fail immediately; transport errors and server
    /// errors are retried up to `max_retries` times with linear backoff.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_get(url).await {
                Ok(body) => return Ok(body),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retryable(e)) if attempt >= self.max_retries => return Err(e),
                Err(Attempt::Retryable(e)) => {
                    attempt += 1;
                    let delay = self.retry_backoff * attempt;
                    warn!(%url, attempt, delay_ms = delay.as_millis() as u64, error = %e, "request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_get(&self, url: &str) -> std::result::Result<String, Attempt> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Attempt::Retryable(StoreFinderError::Network(format!("{url}: {e}"))))?;

        let status = response.status();
        if !status.is_success() {
            let err = StoreFinderError::Network(format!("{url}: HTTP {status}"));
            return Err(if is_retryable(status) {
                Attempt::Retryable(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        response.text().await.map_err(|e| {
            Attempt::Retryable(StoreFinderError::Network(format!(
                "{url}: body read failed: {e}"
            )))
        })
    }
}

/// Outcome of a single failed attempt.
enum Attempt {
    Retryable(StoreFinderError),
    Fatal(StoreFinderError),
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
