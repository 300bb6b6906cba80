use std::path::{Path, PathBuf};

use tracing::warn;

/// A file that is deleted when dropped, unless [`PartialFile::commit`] was called.
///
/// Create the guard before the first byte is written; every early return after that
/// point cleans up the file.
#[derive(Debug)]
pub struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file and hand back its path.
    pub fn commit(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    /// Remove the file now.
    pub fn discard(self) {
        drop(self);
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = crate::remove_if_exists(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove partial file");
        }
    }
}
