use std::fmt;

use crate::sanitize::UnsafePath;

/// Outcome of a best-effort extraction.
#[derive(Clone, Debug, Default)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
    pub skipped: Vec<SkippedEntry>,
}

impl ExtractReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// An entry that was not written, with the raw name as stored in the archive.
#[derive(Clone, Debug)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Unsafe(UnsafePath),
    /// Reading the entry or writing it to disk failed.
    Io(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unsafe(reason) => write!(f, "{reason}"),
            SkipReason::Io(message) => write!(f, "I/O error: {message}"),
        }
    }
}

/// Entries handled so far, passed to the progress callback after each entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractProgress {
    pub entries_done: usize,
    pub entries_total: usize,
}

impl ExtractProgress {
    pub fn fraction(&self) -> f32 {
        if self.entries_total == 0 {
            return 1.0;
        }
        (self.entries_done as f32 / self.entries_total as f32).min(1.0)
    }
}
