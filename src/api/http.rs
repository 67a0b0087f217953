//! Vimeo HTTP client
//!
//! One authenticated GET, with:
//! - 429 handling that honours `Retry-After` without spending the retry budget
//! - bounded retries with backoff for network and decode failures
//! - immediate failure on 401 and other error statuses

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::config::{ApiConfig, DEFAULT_RETRY_AFTER, MAX_RATE_LIMIT_WAITS};
use crate::api::{ApiError, ApiResult};
use crate::metrics::{self, RequestMetrics, RetryKind};
use crate::retry::{self, FailureKind, Retryable};

/// HTTP client for the Vimeo API
pub struct VimeoHttpClient {
    client: Client,
    config: ApiConfig,
}

impl VimeoHttpClient {
    /// Build a client carrying the auth and version headers on every request.
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .default_headers(config.default_headers()?)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Settings this client was built with.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Turn an absolute URL or an API-relative path into a full URL.
    pub fn resolve_url(&self, reference: &str) -> ApiResult<Url> {
        let reference = reference.trim();
        let full = if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else if reference.starts_with('/') {
            format!("{}{}", self.config.base_url, reference)
        } else {
            format!("{}/{}", self.config.base_url, reference)
        };
        Url::parse(&full).map_err(|e| ApiError::InvalidUrl(format!("{reference}: {e}")))
    }

    /// GET a reference and decode the JSON body.
    pub async fn get<T>(&self, reference: &str, query: &[(&str, String)]) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let url = self.resolve_url(reference)?;
        debug!("Making GET request to: {} with {} params", url, query.len());
        self.request_with_retry(url, query).await
    }

    async fn request_with_retry<T>(&self, url: Url, query: &[(&str, String)]) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let mut failures: u32 = 0;
        let mut rate_limit_waits: u32 = 0;

        loop {
            let request_metrics = RequestMetrics::start(url.path(), failures + 1);

            let response = match self.client.get(url.clone()).query(query).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    request_metrics.record_network_error();
                    rate_limit_waits = 0;
                    failures += 1;
                    let kind = FailureKind::from_transport(&e);
                    self.back_off(ApiError::Network(e.to_string()), kind, failures, &url)
                        .await?;
                    continue;
                }
            };

            let status = response.status();
            request_metrics.record_complete(status.as_u16());

            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_limit_waits += 1;
                if rate_limit_waits > MAX_RATE_LIMIT_WAITS {
                    return Err(ApiError::RateLimitExhausted {
                        waits: MAX_RATE_LIMIT_WAITS,
                    });
                }
                let wait = retry_after(response.headers());
                warn!(
                    url = %url,
                    wait_secs = wait.as_secs(),
                    waits = rate_limit_waits,
                    "Rate limited (429), honouring Retry-After"
                );
                tokio::time::sleep(wait).await;
                continue;
            }
            rate_limit_waits = 0;

            if status == StatusCode::UNAUTHORIZED {
                return Err(ApiError::Unauthorized {
                    url: url.to_string(),
                });
            }

            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body,
                });
            }

            let body = match response.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    failures += 1;
                    let kind = FailureKind::from_transport(&e);
                    self.back_off(ApiError::Network(e.to_string()), kind, failures, &url)
                        .await?;
                    continue;
                }
            };

            match serde_json::from_slice::<T>(&body) {
                Ok(data) => {
                    if failures > 0 {
                        debug!("Request succeeded on attempt {}", failures + 1);
                    }
                    return Ok(data);
                }
                Err(e) => {
                    failures += 1;
                    self.back_off(
                        ApiError::Decode(e.to_string()),
                        FailureKind::Malformed,
                        failures,
                        &url,
                    )
                    .await?;
                }
            }
        }
    }

    /// Sleep before the next attempt, or return the terminal error.
    async fn back_off(
        &self,
        error: ApiError,
        kind: FailureKind,
        failures: u32,
        url: &Url,
    ) -> ApiResult<()> {
        let policy = &self.config.retry;
        if !error.is_retryable() {
            return Err(error);
        }

        if !policy.should_retry(&error, failures) {
            retry::log_give_up(url.path(), kind, failures, &error.to_string());
            return Err(ApiError::RetriesExhausted {
                attempts: failures,
                last_error: error.to_string(),
            });
        }

        let backoff = policy.delay_for(failures);
        retry::log_retry(url.path(), kind, failures, policy, backoff);
        metrics::record_retry(RetryKind::Listing, backoff);
        tokio::time::sleep(backoff).await;
        Ok(())
    }
}

/// `Retry-After` in whole seconds, or the default when absent or not an integer.
pub fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}
