use std::fmt;
use std::path::PathBuf;

/// Role of a source in the fallback order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SourceKind {
    #[default]
    Primary,
    Backup,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Primary => write!(f, "primary"),
            SourceKind::Backup => write!(f, "backup"),
        }
    }
}

/// A URL to download from, tagged with its role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadSource {
    pub url: String,
    pub kind: SourceKind,
}

impl DownloadSource {
    pub fn primary(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: SourceKind::Primary,
        }
    }

    pub fn backup(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: SourceKind::Backup,
        }
    }
}

/// Outcome of a successful transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchReport {
    pub path: PathBuf,
    pub bytes: u64,
    /// URL the body was finally read from, after redirects.
    pub final_url: String,
    pub source: SourceKind,
}
