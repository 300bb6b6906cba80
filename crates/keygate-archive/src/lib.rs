//! Zip extraction for the downloaded bundle.
//!
//! # Architecture
//!
//! - `sanitize.rs` - entry name normalization (zip-slip prevention)
//! - `extract.rs` - best-effort, chunked extraction
//! - `report.rs` - extraction report, skip reasons and progress

pub use error::{ExtractError, ExtractErrorKind, Result};
pub use extract::{ExtractOptions, extract, extract_with};
pub use report::{ExtractProgress, ExtractReport, SkipReason, SkippedEntry};
pub use sanitize::{UnsafePath, sanitize_entry_path};

mod error;
mod extract;
mod report;
mod sanitize;
