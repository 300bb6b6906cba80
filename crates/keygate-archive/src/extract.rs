use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use keygate_fs::PartialFile;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{ExtractError, Result};
use crate::report::{ExtractProgress, ExtractReport, SkipReason, SkippedEntry};
use crate::sanitize::{UnsafePath, sanitize_entry_path};

const DEFAULT_BUFFER_SIZE: usize = 8192;

#[derive(Clone)]
pub struct ExtractOptions {
    /// Size of the copy buffer used for every entry.
    pub buffer_size: usize,
    pub on_progress: Option<Arc<dyn Fn(&ExtractProgress) + Send + Sync>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            on_progress: None,
        }
    }
}

impl fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("buffer_size", &self.buffer_size)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl ExtractOptions {
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn on_progress(mut self, callback: Arc<dyn Fn(&ExtractProgress) + Send + Sync>) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

/// Unpack the zip at `archive_path` into `destination` with default options.
pub fn extract(archive_path: &Path, destination: &Path) -> Result<ExtractReport> {
    extract_with(archive_path, destination, &ExtractOptions::default())
}

/// Unpack the zip at `archive_path` into `destination`.
///
/// Extraction is best-effort per entry: unsafe names and entries that fail to read or
/// write are skipped, logged and listed in the report. The call fails only when the
/// archive cannot be opened, the destination cannot be created, or nothing at all
/// could be extracted from a non-empty archive.
///
/// This is blocking I/O; async callers should run it on a blocking thread.
pub fn extract_with(
    archive_path: &Path,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let file = File::open(archive_path).map_err(|source| ExtractError::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file).map_err(|source| ExtractError::InvalidArchive {
        path: archive_path.to_path_buf(),
        source,
    })?;
    keygate_fs::ensure_dir(destination).map_err(|source| ExtractError::Destination {
        path: destination.to_path_buf(),
        source,
    })?;

    let entries_total = archive.len();
    let mut report = ExtractReport::default();
    let mut buffer = vec![0u8; options.buffer_size.max(1)];
    debug!(archive = %archive_path.display(), entries = entries_total, "extracting");

    for index in 0..entries_total {
        match archive.by_index(index) {
            Ok(mut entry) => {
                let name = entry.name().to_string();
                let is_dir = entry.is_dir();
                match sanitize_entry_path(&name) {
                    Ok(relative) => {
                        let target = destination.join(relative);
                        let written = if is_dir {
                            fs::create_dir_all(&target).map(|()| None)
                        } else {
                            write_entry(&mut entry, &target, &mut buffer).map(Some)
                        };
                        match written {
                            Ok(None) => report.directories += 1,
                            Ok(Some(bytes)) => {
                                report.files += 1;
                                report.bytes += bytes;
                            }
                            Err(e) => skip(&mut report, name, SkipReason::Io(e.to_string())),
                        }
                    }
                    // A directory entry naming the archive root.
                    Err(UnsafePath::Empty) if is_dir => {}
                    Err(reason) => skip(&mut report, name, SkipReason::Unsafe(reason)),
                }
            }
            Err(e) => skip(&mut report, format!("#{index}"), SkipReason::Io(e.to_string())),
        }

        if let Some(ref callback) = options.on_progress {
            callback(&ExtractProgress {
                entries_done: index + 1,
                entries_total,
            });
        }
    }

    if report.files == 0 && report.directories == 0 && !report.skipped.is_empty() {
        return Err(ExtractError::NothingExtracted {
            skipped: report.skipped,
        });
    }

    info!(
        archive = %archive_path.display(),
        destination = %destination.display(),
        files = report.files,
        directories = report.directories,
        bytes = report.bytes,
        skipped = report.skipped.len(),
        "archive extracted"
    );
    Ok(report)
}

/// Stream one entry to `target`. A failed write removes the partial file.
fn write_entry(reader: &mut impl Read, target: &Path, buffer: &mut [u8]) -> io::Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut out = File::create(target)?;
    let partial = PartialFile::new(target);
    let copied = copy_chunks(reader, &mut out, buffer);
    drop(out);
    let written = copied?;
    partial.commit();
    Ok(written)
}

fn copy_chunks(reader: &mut impl Read, out: &mut File, buffer: &mut [u8]) -> io::Result<u64> {
    let mut written = 0u64;
    loop {
        let n = reader.read(buffer)?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])?;
        written += n as u64;
    }
    out.flush()?;
    Ok(written)
}

fn skip(report: &mut ExtractReport, name: String, reason: SkipReason) {
    warn!(entry = %name, reason = %reason, "skipping archive entry");
    report.skipped.push(SkippedEntry { name, reason });
}
