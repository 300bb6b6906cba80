//! Error types for keygate-fetch.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("connection to {url} timed out after {after:?}")]
    ConnectTimeout { url: String, after: Duration },

    #[error("transfer from {url} did not finish within {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("HTTP error: {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("more than {max} redirects starting at {url}")]
    TooManyRedirects { url: String, max: u32 },

    #[error("transfer from {url} too slow: {observed} B/s, minimum is {limit} B/s")]
    LowThroughput {
        url: String,
        observed: u64,
        limit: u64,
    },

    #[error("network error while reading {url}: {message}")]
    Network { url: String, message: String },

    #[error("downloaded file is empty; the download may have been blocked")]
    EmptyFile,

    #[error("downloaded file is too small ({size} bytes, expected at least {min})")]
    Undersized { size: u64, min: u64 },

    #[error("file I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Fs(#[from] keygate_fs::Error),

    #[error("no download sources given")]
    NoSources,
}

/// Coarse classification used by callers that only care about the failure family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferErrorKind {
    Connect,
    Timeout,
    HttpError,
    LowThroughput,
    EmptyOrUndersized,
    Network,
    Io,
    Config,
}

impl FetchError {
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            Self::Connect { .. } | Self::ConnectTimeout { .. } => TransferErrorKind::Connect,
            Self::Timeout { .. } => TransferErrorKind::Timeout,
            Self::Http { .. } | Self::TooManyRedirects { .. } => TransferErrorKind::HttpError,
            Self::LowThroughput { .. } => TransferErrorKind::LowThroughput,
            Self::EmptyFile | Self::Undersized { .. } => TransferErrorKind::EmptyOrUndersized,
            Self::Network { .. } => TransferErrorKind::Network,
            Self::Io { .. } | Self::Fs(_) => TransferErrorKind::Io,
            Self::InvalidUrl { .. } | Self::NoSources => TransferErrorKind::Config,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
