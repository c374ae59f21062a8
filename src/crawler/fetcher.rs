//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests of a job, including:
//! - Building the HTTP client with the configured user agent
//! - Taking a rate-limiter token before every attempt
//! - Enforcing the per-attempt timeout and the response size ceiling
//! - Retrying transient failures with capped exponential backoff
//! - Streaming bodies into a [`BodySink`]
//! - Error classification

use crate::config::{JobConfig, UserAgentConfig};
use crate::crawler::rate_limiter::RateLimiter;
use crate::storage::BodySink;
use crate::HarvestError;
use futures::StreamExt;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Maximum redirect hops followed for a single request
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Upper bound for a single request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Capped exponential backoff between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.backoff_base(),
            max_delay: config.backoff_max(),
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    ///
    /// `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Response metadata of a successful fetch
#[derive(Debug, Clone)]
pub struct FetchMeta {
    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Body bytes delivered to the sink
    pub bytes: u64,
}

/// A page fetched fully into memory
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: Vec<u8>,
    pub meta: FetchMeta,
}

/// Issues rate-limited, retried GET requests for one job
pub struct Fetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    timeout: Duration,
    max_response_bytes: u64,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        config: &JobConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            limiter,
            policy: RetryPolicy::from_config(config),
            timeout: config.timeout(),
            max_response_bytes: config.max_response_bytes,
            cancel,
        }
    }

    /// Fetches a URL into memory
    ///
    /// See [`Fetcher::fetch_into`] for the request flow.
    pub async fn fetch(&self, url: &Url, attempts: &mut u32) -> Result<FetchedPage, HarvestError> {
        let mut body = Vec::new();
        let meta = self.fetch_into(url, &mut body, attempts).await?;
        Ok(FetchedPage { body, meta })
    }

    /// Fetches a URL, streaming the body into `sink`
    ///
    /// # Request Flow
    ///
    /// 1. Take a token from the job's rate limiter (every attempt does)
    /// 2. Send the GET, following up to 10 redirects
    /// 3. Classify the status; reject oversized bodies from Content-Length
    /// 4. Restart the sink and stream the body, counting bytes
    /// 5. On a retryable failure, back off and go to 1
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Timeout | Retry with backoff |
    /// | Connection reset / refused | Retry with backoff |
    /// | HTTP 5xx | Retry with backoff |
    /// | HTTP 4xx | Immediate → HttpClientError |
    /// | Body over the size limit | Immediate → ResourceTooLarge |
    /// | Cancellation | Immediate → Cancelled |
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `sink` - Where the body goes
    /// * `attempts` - Incremented once per attempt made, so the caller knows
    ///   how many were used even when an error is returned
    pub async fn fetch_into<S>(
        &self,
        url: &Url,
        sink: &mut S,
        attempts: &mut u32,
    ) -> Result<FetchMeta, HarvestError>
    where
        S: BodySink,
    {
        loop {
            if self.cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }

            self.limiter.acquire(&self.cancel).await?;
            *attempts += 1;
            let attempt = *attempts;

            tracing::debug!(url = %url, attempt, "Fetching");

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(HarvestError::Cancelled),
                outcome = tokio::time::timeout(self.timeout, self.attempt(url, &mut *sink)) => {
                    match outcome {
                        Ok(result) => result,
                        Err(_) => Err(HarvestError::Timeout { url: url.to_string() }),
                    }
                }
            };

            let err = match result {
                Ok(meta) => return Ok(meta),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.policy.max_attempts {
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                url = %url,
                attempt,
                "Attempt failed ({}), retrying in {:?}",
                err,
                delay
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(HarvestError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One request/response exchange
    async fn attempt<S>(&self, url: &Url, sink: &mut S) -> Result<FetchMeta, HarvestError>
    where
        S: BodySink,
    {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(HarvestError::HttpServerError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(HarvestError::HttpClientError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_response_bytes {
                return Err(self.too_large(url));
            }
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        sink.restart().await?;

        let mut bytes = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify_error(url, e))?;
            bytes += chunk.len() as u64;
            // Content-Length may be absent or lie
            if bytes > self.max_response_bytes {
                return Err(self.too_large(url));
            }
            sink.write_chunk(&chunk).await?;
        }

        Ok(FetchMeta {
            final_url,
            status: status.as_u16(),
            content_type,
            bytes,
        })
    }

    fn too_large(&self, url: &Url) -> HarvestError {
        HarvestError::ResourceTooLarge {
            url: url.to_string(),
            limit: self.max_response_bytes,
        }
    }
}

/// Maps a reqwest error onto the job error taxonomy
fn classify_error(url: &Url, err: reqwest::Error) -> HarvestError {
    if err.is_timeout() {
        HarvestError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_builder() {
        HarvestError::InvalidInput(format!("Cannot build request for {}: {}", url, err))
    } else if err.is_connect() || err.is_request() || err.is_body() || err.is_decode() {
        HarvestError::NetworkTransient {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else {
        // redirect loops and the like: not worth another attempt
        HarvestError::Http {
            url: url.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "0.1".to_string(),
            contact_url: None,
        }
    }

    fn policy(max_attempts: u32, base_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
        }
    }

    fn fetcher(config: &JobConfig, cancel: CancellationToken) -> Fetcher {
        let client = build_http_client(&create_test_config(), config.timeout()).unwrap();
        let limiter = Arc::new(RateLimiter::from_config(config));
        Fetcher::new(client, limiter, config, cancel)
    }

    #[tokio::test]
    async fn test_redirect_loop_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
            .mount(&server)
            .await;

        let fetcher = fetcher(&JobConfig::default(), CancellationToken::new());
        let url = Url::parse(&format!("{}/loop", server.uri())).unwrap();

        let mut attempts = 0;
        let err = fetcher.fetch(&url, &mut attempts).await.unwrap_err();

        assert!(matches!(err, HarvestError::Http { .. }));
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy.js"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = JobConfig {
            max_attempts: 3,
            backoff_base_ms: 10_000,
            backoff_max_ms: 10_000,
            ..JobConfig::default()
        };
        let cancel = CancellationToken::new();
        let fetcher = fetcher(&config, cancel.clone());
        let url = Url::parse(&format!("{}/busy.js", server.uri())).unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let mut attempts = 0;
        let err = fetcher.fetch(&url, &mut attempts).await.unwrap_err();

        assert!(matches!(err, HarvestError::Cancelled));
        assert_eq!(attempts, 1);
        assert!(started.elapsed() < Duration::from_secs(5));

        let requests = server.received_requests().await.unwrap();
        assert!(requests.len() < config.max_attempts as usize);
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&create_test_config(), Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let p = policy(5, 100, 10_000);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(p.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_capped() {
        let p = policy(50, 500, 2_000);
        assert_eq!(p.delay_for(3), Duration::from_millis(2_000));
        assert_eq!(p.delay_for(40), Duration::from_millis(2_000));
    }

    #[test]
    fn test_policy_from_config_keeps_at_least_one_attempt() {
        let config = JobConfig {
            max_attempts: 0,
            ..JobConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts, 1);
    }
}
