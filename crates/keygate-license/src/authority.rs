use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::AuthorityError;
use crate::http::{RetryPolicy, build_client, get_with_retry};
use crate::key::LicenseKey;

/// The remote service that says whether a token is currently valid.
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    /// `Ok(false)` is a definite rejection; errors mean no usable answer arrived.
    async fn is_valid(&self, key: &LicenseKey) -> Result<bool, AuthorityError>;
}

#[derive(Debug, Deserialize)]
struct ValidityResponse {
    valid: bool,
}

/// Token authority reached with `GET <base_url>/<token>`, answering `{"valid": bool}`.
#[derive(Debug, Clone)]
pub struct HttpTokenAuthority {
    client: reqwest::Client,
    base_url: url::Url,
    retry: RetryPolicy,
}

impl HttpTokenAuthority {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, AuthorityError> {
        let base_url = url::Url::parse(base_url)
            .map_err(|e| AuthorityError::Malformed(format!("invalid authority URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AuthorityError::Malformed(format!(
                "authority URL cannot take a path: {base_url}"
            )));
        }
        let client = build_client(timeout)
            .map_err(|e| AuthorityError::Unreachable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            retry,
        })
    }

    /// The token becomes a single percent-encoded path segment.
    fn url_for(&self, key: &LicenseKey) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(key.expose());
        }
        url.to_string()
    }
}

#[async_trait]
impl TokenAuthority for HttpTokenAuthority {
    async fn is_valid(&self, key: &LicenseKey) -> Result<bool, AuthorityError> {
        let url = self.url_for(key);
        debug!(key = %key, "querying token authority");

        let fetched = get_with_retry(&self.client, &url, &self.retry)
            .await
            .map_err(AuthorityError::Unreachable)?;

        match serde_json::from_str::<ValidityResponse>(&fetched.body) {
            Ok(response) => Ok(response.valid),
            Err(_) if !(200..300).contains(&fetched.status) => Err(AuthorityError::Unreachable(
                format!("authority answered with status {}", fetched.status),
            )),
            Err(e) => Err(AuthorityError::Malformed(format!(
                "unexpected authority response: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_one_encoded_segment() {
        let authority = HttpTokenAuthority::new(
            "https://auth.test/api/v2/token/isValid/",
            Duration::from_secs(5),
            RetryPolicy::none(),
        )
        .unwrap();
        assert_eq!(
            authority.url_for(&LicenseKey::new("abc/../x y")),
            "https://auth.test/api/v2/token/isValid/abc%2F..%2Fx%20y"
        );
    }

    #[test]
    fn test_base_without_trailing_slash() {
        let authority = HttpTokenAuthority::new(
            "https://auth.test/isValid",
            Duration::from_secs(5),
            RetryPolicy::none(),
        )
        .unwrap();
        assert_eq!(
            authority.url_for(&LicenseKey::new("KEY")),
            "https://auth.test/isValid/KEY"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpTokenAuthority::new("not a url", Duration::from_secs(5), RetryPolicy::none())
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Malformed(_)));
    }
}
