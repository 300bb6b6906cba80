//! Streaming HTTP download for the bundle archive.
//!
//! # Architecture
//!
//! - [`data`] - options, phases, progress and source descriptions
//! - [`core`] - pure checks: redirects, status codes, size floor, throughput floor, backoff
//! - [`effects`] - the [`HttpClient`] seam, the reqwest client and the [`Fetcher`]
//!
//! A transfer streams straight into the destination path behind a
//! [`keygate_fs::PartialFile`] guard: any failure (transport, HTTP status, timeout,
//! throughput floor, size floor) removes what was written before the error is returned.

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use crate::core::{ThroughputMeter, is_http_error, is_redirect, retry_delay};
pub use data::{
    DownloadSource, FetchOptions, FetchPhase, FetchReport, LowSpeedLimit, Progress, SourceKind,
    Timeouts,
};
pub use effects::{BoxStream, Fetcher, HttpClient, HttpResponse};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

pub use error::{FetchError, Result, TransferErrorKind};
