//! Pure checks used by the fetcher. Nothing in here performs I/O.

mod retry;
mod throughput;
mod validation;

pub use retry::retry_delay;
pub use throughput::ThroughputMeter;
pub use validation::{check_file_size, is_http_error, is_redirect, resolve_location};
