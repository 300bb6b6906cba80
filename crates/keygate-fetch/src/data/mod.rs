//! Configuration, progress and source types for fetching.

pub mod options;
pub mod progress;
pub mod sources;

pub use options::{FetchOptions, FetchPhase, LowSpeedLimit, Timeouts};
pub use progress::Progress;
pub use sources::{DownloadSource, FetchReport, SourceKind};
