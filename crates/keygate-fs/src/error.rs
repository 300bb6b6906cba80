use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to create directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to remove '{path}': {source}")]
    Remove { path: PathBuf, source: io::Error },
}

impl Error {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Write { path, .. }
            | Self::Read { path, .. }
            | Self::CreateDir { path, .. }
            | Self::Remove { path, .. } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
