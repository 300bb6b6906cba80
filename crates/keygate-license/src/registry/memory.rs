use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{RegistryStore, VersionToken, VersionedDocument};
use crate::error::StoreError;

/// In-process [`RegistryStore`] versioned by the SHA-256 of its content.
///
/// Counts reads and writes, and can inject a write from a simulated concurrent client
/// right before the next write is applied.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    document: Option<VersionedDocument>,
    reads: usize,
    writes: usize,
    interleaved: Option<String>,
}

fn content_version(content: &str) -> VersionToken {
    VersionToken::new(hex::encode(Sha256::digest(content.as_bytes())))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        let content = content.into();
        let version = content_version(&content);
        Self {
            state: Mutex::new(State {
                document: Some(VersionedDocument { content, version }),
                ..State::default()
            }),
        }
    }

    pub fn content(&self) -> Option<String> {
        self.lock().document.as_ref().map(|d| d.content.clone())
    }

    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    /// Successful writes, including injected ones.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Before the next `write` is checked, store `content` as if another client had
    /// written it after our read.
    pub fn interleave_write(&self, content: impl Into<String>) {
        self.lock().interleaved = Some(content.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn read(&self) -> Result<Option<VersionedDocument>, StoreError> {
        let mut state = self.lock();
        state.reads += 1;
        Ok(state.document.clone())
    }

    async fn write(
        &self,
        content: &str,
        expected: Option<&VersionToken>,
    ) -> Result<VersionToken, StoreError> {
        let mut state = self.lock();

        if let Some(concurrent) = state.interleaved.take() {
            let version = content_version(&concurrent);
            state.document = Some(VersionedDocument {
                content: concurrent,
                version,
            });
            state.writes += 1;
        }

        let current = state.document.as_ref().map(|d| &d.version);
        if current != expected {
            return Err(StoreError::Conflict);
        }

        let version = content_version(content);
        state.document = Some(VersionedDocument {
            content: content.to_string(),
            version: version.clone(),
        });
        state.writes += 1;
        Ok(version)
    }
}
