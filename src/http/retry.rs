// src/http/retry.rs
// =============================================================================
// Retry wrapper around HttpClient::get.
//
// The portal answers 408 (Request Timeout) under load. Those responses are
// retried with a capped exponential backoff, up to `max_attempts` requests in
// total. Every other status is handed back to the caller untouched.
// =============================================================================

use super::{HttpClient, Response};
use crate::error::CrawlError;
use std::time::Duration;
use tracing::warn;

pub const REQUEST_TIMEOUT: u16 = 408;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of requests (including the first)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    // base * 2^(attempt-1), capped. `attempt` is 1-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

pub async fn get_with_retry(
    client: &dyn HttpClient,
    url: &str,
    timeout: Option<Duration>,
    policy: &RetryPolicy,
) -> Result<Response, CrawlError> {
    let mut attempt = 1u32;

    loop {
        let response = client
            .get(url, timeout)
            .await
            .map_err(|source| CrawlError::Http {
                url: url.to_string(),
                source,
            })?;

        if response.status != REQUEST_TIMEOUT {
            return Ok(response);
        }

        if attempt >= policy.max_attempts {
            return Err(CrawlError::RetriesExhausted {
                url: url.to_string(),
                attempts: attempt,
                status: response.status,
            });
        }

        let delay = policy.backoff(attempt);
        warn!(url, attempt, ?delay, "received response with code 408, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
