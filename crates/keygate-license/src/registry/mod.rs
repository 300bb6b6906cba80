//! The shared key → identity record and its optimistic-concurrency store.
//!
//! The record is one JSON object (`{"<key>": "<address>", ...}`) held by a
//! [`RegistryStore`]. Every read hands back a [`VersionToken`]; every write names the
//! version it was derived from and fails with [`StoreError::Conflict`] when another
//! writer got there first. There is no unconditional write.

mod http;
mod memory;

pub use http::HttpDocumentStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Result, StoreError, ValidationError};
use crate::key::{IdentityFingerprint, LicenseKey};

/// Opaque version of a stored document (a content hash or a store-issued revision id).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedDocument {
    pub content: String,
    pub version: VersionToken,
}

/// A versioned key/value document store.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Current document, or `None` when it has never been written.
    async fn read(&self) -> std::result::Result<Option<VersionedDocument>, StoreError>;

    /// Replace the document if it is still at `expected`.
    ///
    /// `expected = None` creates the document and conflicts if it already exists.
    async fn write(
        &self,
        content: &str,
        expected: Option<&VersionToken>,
    ) -> std::result::Result<VersionToken, StoreError>;
}

/// Parsed registry content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyRecord {
    bindings: BTreeMap<String, String>,
}

impl KeyRecord {
    /// Blank content counts as an empty record; anything else must be a JSON object of
    /// strings.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let bindings: BTreeMap<String, String> = serde_json::from_str(content).map_err(|e| {
            ValidationError::ResponseMalformed(format!("registry document is not a key map: {e}"))
        })?;
        Ok(Self { bindings })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.bindings)
            .map_err(|e| ValidationError::Internal(format!("failed to encode registry: {e}")))
    }

    pub fn bound_identity(&self, key: &LicenseKey) -> Option<IdentityFingerprint> {
        self.bindings
            .get(key.expose())
            .map(|address| IdentityFingerprint::new(address.clone()))
    }

    /// Add `key → identity`. Returns `false` when that exact binding already exists.
    pub fn bind(&mut self, key: &LicenseKey, identity: &IdentityFingerprint) -> bool {
        let previous = self
            .bindings
            .insert(key.expose().to_string(), identity.as_str().to_string());
        previous.as_deref() != Some(identity.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A record together with the version it was read at.
#[derive(Clone, Debug)]
pub struct RegistrySnapshot {
    pub record: KeyRecord,
    /// `None` when the document does not exist yet.
    pub version: Option<VersionToken>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindOutcome {
    /// The binding was new and has been written.
    Written(VersionToken),
    /// The record already held this exact binding; nothing was written.
    Unchanged,
}

/// Reads the key record and adds bindings to it with conditional writes.
#[derive(Clone)]
pub struct KeyRegistryClient {
    store: Arc<dyn RegistryStore>,
}

impl fmt::Debug for KeyRegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRegistryClient").finish_non_exhaustive()
    }
}

impl KeyRegistryClient {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self) -> Result<RegistrySnapshot> {
        match self.store.read().await? {
            Some(document) => {
                let record = KeyRecord::parse(&document.content)?;
                debug!(entries = record.len(), version = %document.version, "registry fetched");
                Ok(RegistrySnapshot {
                    record,
                    version: Some(document.version),
                })
            }
            None => {
                debug!("registry document absent, starting from an empty record");
                Ok(RegistrySnapshot {
                    record: KeyRecord::default(),
                    version: None,
                })
            }
        }
    }

    /// Add `key → identity` to `snapshot` and write it back, conditioned on the
    /// snapshot's version.
    pub async fn bind(
        &self,
        snapshot: &RegistrySnapshot,
        key: &LicenseKey,
        identity: &IdentityFingerprint,
    ) -> Result<BindOutcome> {
        let mut record = snapshot.record.clone();
        if !record.bind(key, identity) {
            return Ok(BindOutcome::Unchanged);
        }

        let content = record.to_json()?;
        let version = self
            .store
            .write(&content, snapshot.version.as_ref())
            .await?;
        info!(key = %key, identity = %identity, version = %version, "license key bound");
        Ok(BindOutcome::Written(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_parse_blank() {
        assert!(KeyRecord::parse("").unwrap().is_empty());
        assert!(KeyRecord::parse("  \n").unwrap().is_empty());
        assert!(KeyRecord::parse("{}").unwrap().is_empty());
    }

    #[test]
    fn test_record_parse_rejects_non_map() {
        let err = KeyRecord::parse("[1, 2]").unwrap_err();
        assert!(matches!(err, ValidationError::ResponseMalformed(_)));
        assert!(KeyRecord::parse(r#"{"k": 5}"#).is_err());
    }

    #[test]
    fn test_record_bind_and_lookup() {
        let key = LicenseKey::new("KEY-1");
        let a = IdentityFingerprint::new("10.0.0.1");
        let mut record = KeyRecord::parse(r#"{"OTHER": "10.0.0.9"}"#).unwrap();

        assert_eq!(record.bound_identity(&key), None);
        assert!(record.bind(&key, &a));
        assert!(!record.bind(&key, &a));
        assert_eq!(record.bound_identity(&key), Some(a));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let mut record = KeyRecord::default();
        record.bind(&LicenseKey::new("K"), &IdentityFingerprint::new("1.2.3.4"));
        let reparsed = KeyRecord::parse(&record.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, record);
    }
}
