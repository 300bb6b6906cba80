use std::io;
use std::path::PathBuf;

use crate::report::SkippedEntry;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to open archive '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("'{path}' is not a readable zip archive: {source}")]
    InvalidArchive {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("failed to prepare destination '{path}': {source}")]
    Destination {
        path: PathBuf,
        source: keygate_fs::Error,
    },

    #[error("no entry of the archive could be extracted ({} skipped)", skipped.len())]
    NothingExtracted { skipped: Vec<SkippedEntry> },
}

/// Failure family of an [`ExtractError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractErrorKind {
    OpenFailed,
    EntryIoFailed,
}

impl ExtractError {
    pub fn kind(&self) -> ExtractErrorKind {
        match self {
            Self::Open { .. } | Self::InvalidArchive { .. } => ExtractErrorKind::OpenFailed,
            Self::Destination { .. } | Self::NothingExtracted { .. } => {
                ExtractErrorKind::EntryIoFailed
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
