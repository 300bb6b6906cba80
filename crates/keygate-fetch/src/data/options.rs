use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::progress::Progress;

/// Phases of a single transfer, in order: Connecting → Downloading → Verifying → Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPhase {
    /// Waiting for response headers, following redirects.
    #[default]
    Connecting,

    /// Streaming the body to disk.
    Downloading,

    /// Checking the file that landed on disk.
    Verifying,

    /// Terminal state of a successful transfer.
    Completed,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPhase::Connecting => write!(f, "Connecting"),
            FetchPhase::Downloading => write!(f, "Downloading"),
            FetchPhase::Verifying => write!(f, "Verifying"),
            FetchPhase::Completed => write!(f, "Completed"),
        }
    }
}

/// Timeouts applied to every transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Upper bound for receiving response headers from one URL.
    pub connect: Duration,

    /// Upper bound for the whole attempt, redirects and body included.
    pub total: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            total: Duration::from_secs(60),
        }
    }
}

/// Abort when the average rate over `window` stays under `bytes_per_sec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowSpeedLimit {
    pub bytes_per_sec: u64,
    pub window: Duration,
}

impl Default for LowSpeedLimit {
    fn default() -> Self {
        Self {
            bytes_per_sec: 500,
            window: Duration::from_secs(20),
        }
    }
}

/// Configuration for a transfer.
///
/// ```
/// use keygate_fetch::FetchOptions;
/// use std::time::Duration;
///
/// let options = FetchOptions::default()
///     .max_redirects(5)
///     .min_file_size(4096)
///     .header("Authorization", "Bearer token");
/// assert_eq!(options.max_redirects, 5);
/// ```
#[derive(Clone)]
pub struct FetchOptions {
    pub timeouts: Timeouts,

    /// Throughput floor. `None` disables the check.
    pub low_speed: Option<LowSpeedLimit>,

    /// Redirect hops followed before giving up.
    ///
    /// Default: 10
    pub max_redirects: u32,

    /// Smallest plausible size of a finished download, in bytes.
    /// Empty files are always rejected.
    ///
    /// Default: 1024
    pub min_file_size: u64,

    /// Headers sent with every request, redirects included.
    pub headers: Arc<[(String, String)]>,

    /// Invoked on phase changes and after every chunk written.
    pub on_progress: Option<Arc<dyn Fn(&Progress) + Send + Sync>>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("timeouts", &self.timeouts)
            .field("low_speed", &self.low_speed)
            .field("max_redirects", &self.max_redirects)
            .field("min_file_size", &self.min_file_size)
            .field("headers", &self.headers)
            .field("on_progress", &"{ ... }")
            .finish()
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            low_speed: Some(LowSpeedLimit::default()),
            max_redirects: 10,
            min_file_size: 1024,
            headers: Arc::from(vec![
                ("Accept".to_string(), "*/*".to_string()),
                ("Cache-Control".to_string(), "no-cache".to_string()),
            ]),
            on_progress: None,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn low_speed(mut self, low_speed: Option<LowSpeedLimit>) -> Self {
        self.low_speed = low_speed;
        self
    }

    #[must_use]
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    #[must_use]
    pub fn min_file_size(mut self, min_file_size: u64) -> Self {
        self.min_file_size = min_file_size;
        self
    }

    /// Add a single header on top of the existing ones.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers: Vec<_> = self.headers.iter().cloned().collect();
        headers.push((key.into(), value.into()));
        self.headers = Arc::from(headers);
        self
    }

    #[must_use]
    pub fn on_progress(mut self, on_progress: Arc<dyn Fn(&Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_transfer_policy() {
        let options = FetchOptions::default();
        assert_eq!(options.timeouts.connect, Duration::from_secs(15));
        assert_eq!(options.timeouts.total, Duration::from_secs(60));
        assert_eq!(
            options.low_speed,
            Some(LowSpeedLimit {
                bytes_per_sec: 500,
                window: Duration::from_secs(20)
            })
        );
        assert_eq!(options.max_redirects, 10);
        assert_eq!(options.min_file_size, 1024);
        assert!(options.headers.iter().any(|(k, v)| k == "Cache-Control" && v == "no-cache"));
    }

    #[test]
    fn test_header_appends() {
        let options = FetchOptions::default().header("X-Test", "1");
        assert_eq!(options.headers.len(), 3);
        assert_eq!(options.headers[2], ("X-Test".to_string(), "1".to_string()));
    }
}
