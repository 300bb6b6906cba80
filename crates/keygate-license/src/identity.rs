use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::IdentityError;
use crate::http::{RetryPolicy, build_client, get_with_retry};
use crate::key::IdentityFingerprint;

/// Looks up the caller's current public address. Never cached.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self) -> Result<IdentityFingerprint, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct AddressResponse {
    ip: String,
}

/// "What is my address" service answering `{"ip": "<address>"}`.
#[derive(Debug, Clone)]
pub struct HttpIdentityResolver {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl HttpIdentityResolver {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, IdentityError> {
        let client = build_client(timeout)
            .map_err(|e| IdentityError::Unreachable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            retry,
        })
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve(&self) -> Result<IdentityFingerprint, IdentityError> {
        let fetched = get_with_retry(&self.client, &self.url, &self.retry)
            .await
            .map_err(IdentityError::Unreachable)?;
        if !(200..300).contains(&fetched.status) {
            return Err(IdentityError::Unreachable(format!(
                "identity service answered with status {}",
                fetched.status
            )));
        }

        let response: AddressResponse = serde_json::from_str(&fetched.body)
            .map_err(|e| IdentityError::Malformed(format!("unexpected identity response: {e}")))?;
        let address = response.ip.trim();
        if address.is_empty() {
            return Err(IdentityError::Malformed(
                "identity service returned an empty address".into(),
            ));
        }

        debug!(address = %address, "resolved network identity");
        Ok(IdentityFingerprint::new(address))
    }
}
