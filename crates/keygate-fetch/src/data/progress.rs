use super::options::FetchPhase;
use super::sources::SourceKind;

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub phase: FetchPhase,

    /// Which source this attempt is reading from.
    pub source: SourceKind,

    /// Bytes written to the destination so far in this attempt.
    pub bytes_downloaded: u64,

    /// Expected size from `Content-Length`, if the server sent one.
    pub total_bytes: Option<u64>,
}

impl Progress {
    /// Completed share in `[0, 1]`, or `None` while the total is unknown.
    #[must_use]
    pub fn fraction(&self) -> Option<f32> {
        if self.phase == FetchPhase::Completed {
            return Some(1.0);
        }
        match self.total_bytes {
            Some(0) | None => None,
            Some(total) => Some((self.bytes_downloaded as f64 / total as f64).min(1.0) as f32),
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == FetchPhase::Completed
    }
}
