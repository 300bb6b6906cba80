use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{RegistryStore, VersionToken, VersionedDocument};
use crate::error::StoreError;
use crate::http::build_client;

/// A single file in a repository-contents style HTTP API.
///
/// - `GET <url>` answers `{"content": "<base64>", "sha": "<revision>"}`, or 404 when
///   the file does not exist.
/// - `PUT <url>` takes `{"message", "content": "<base64>", "sha"}` and answers
///   `{"content": {"sha": "<new revision>"}}`. A stale `sha` is refused with 409 or
///   412; creating a file that already exists is refused with 422.
#[derive(Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: WrittenFile,
}

#[derive(Debug, Deserialize)]
struct WrittenFile {
    sha: String,
}

impl fmt::Debug for HttpDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDocumentStore")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "****"))
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl HttpDocumentStore {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = build_client(timeout)
            .map_err(|e| StoreError::Unavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            token: None,
            message: "Register license binding".to_string(),
        })
    }

    /// Bearer token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Commit message attached to writes.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("{context}: {e}"))
}

#[async_trait]
impl RegistryStore for HttpDocumentStore {
    async fn read(&self) -> Result<Option<VersionedDocument>, StoreError> {
        debug!(url = %self.url, "reading registry document");
        let response = self
            .authorize(self.client.get(&self.url))
            .send()
            .await
            .map_err(|e| unavailable("registry read failed", e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Unavailable(format!(
                "registry read answered with status {status}"
            )));
        }

        let file: FileResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("unexpected registry response: {e}")))?;
        // The API wraps base64 at 60 columns.
        let packed: String = file.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(packed)
            .map_err(|e| StoreError::Malformed(format!("registry content is not base64: {e}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| StoreError::Malformed(format!("registry content is not UTF-8: {e}")))?;

        Ok(Some(VersionedDocument {
            content,
            version: VersionToken::new(file.sha),
        }))
    }

    async fn write(
        &self,
        content: &str,
        expected: Option<&VersionToken>,
    ) -> Result<VersionToken, StoreError> {
        let body = WriteRequest {
            message: &self.message,
            content: STANDARD.encode(content),
            sha: expected.map(VersionToken::as_str),
        };
        debug!(url = %self.url, expected = ?expected.map(VersionToken::as_str), "writing registry document");

        let response = self
            .authorize(self.client.put(&self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| unavailable("registry write failed", e))?;

        let status = response.status();
        match status {
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                warn!(url = %self.url, %status, "registry write refused, document changed");
                return Err(StoreError::Conflict);
            }
            StatusCode::UNPROCESSABLE_ENTITY if expected.is_none() => {
                warn!(url = %self.url, "registry document appeared before it could be created");
                return Err(StoreError::Conflict);
            }
            s if !s.is_success() => {
                return Err(StoreError::Unavailable(format!(
                    "registry write answered with status {status}"
                )));
            }
            _ => {}
        }

        let written: WriteResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("unexpected registry write response: {e}")))?;
        Ok(VersionToken::new(written.content.sha))
    }
}
