//! reqwest plumbing shared by the HTTP-backed authority, identity and registry clients.

use std::time::Duration;

use keygate_fetch::retry_delay;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::warn;

pub(crate) const USER_AGENT_VALUE: &str = concat!("keygate-license/", env!("CARGO_PKG_VERSION"));

/// How often a GET is attempted before giving up, and the base of the backoff between
/// attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }
}

pub(crate) fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
}

/// A response that arrived with a body.
#[derive(Debug)]
pub(crate) struct Fetched {
    pub status: u16,
    pub body: String,
}

/// GET `url`, retrying transport failures, 5xx statuses and empty bodies.
///
/// A non-empty response is returned as is, whatever its status; callers decide what
/// the status means. The error is a diagnostic for the last failed attempt.
pub(crate) async fn get_with_retry(
    client: &reqwest::Client,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Fetched, String> {
    let attempts = policy.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = retry_delay(attempt - 1, policy.base_delay);
            warn!(url = %url, attempt, error = %last_error, delay_ms = delay.as_millis(), "retrying request");
            tokio::time::sleep(delay).await;
        }

        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                last_error = format!("request failed: {e}");
                continue;
            }
        };
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                last_error = format!("failed to read response body: {e}");
                continue;
            }
        };

        if status >= 500 {
            last_error = format!("server error {status}");
            continue;
        }
        if body.trim().is_empty() {
            last_error = format!("empty response (status {status})");
            continue;
        }
        return Ok(Fetched { status, body });
    }

    Err(last_error)
}
