use std::time::Duration;

use tokio::time::Instant;

use crate::data::LowSpeedLimit;

/// Sliding-window throughput floor.
///
/// Timestamps come from the tokio clock, the same clock the transfer timeouts use.
///
/// Bytes are accumulated per window; when a window closes with an average rate below
/// the floor, [`ThroughputMeter::record`] reports the observed rate as an error.
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    limit: LowSpeedLimit,
    window_start: Instant,
    window_bytes: u64,
}

impl ThroughputMeter {
    pub fn new(limit: LowSpeedLimit, now: Instant) -> Self {
        Self {
            limit,
            window_start: now,
            window_bytes: 0,
        }
    }

    /// The window length, which is also the longest allowed gap between two chunks.
    pub fn window(&self) -> Duration {
        self.limit.window
    }

    /// Record `bytes` received at `now`. Returns `Err(observed_bytes_per_sec)` when a
    /// completed window fell below the floor.
    pub fn record(&mut self, bytes: u64, now: Instant) -> Result<(), u64> {
        self.window_bytes = self.window_bytes.saturating_add(bytes);

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.limit.window {
            return Ok(());
        }

        let secs = elapsed.as_secs_f64().max(f64::EPSILON);
        let observed = (self.window_bytes as f64 / secs) as u64;
        self.window_start = now;
        self.window_bytes = 0;

        if observed < self.limit.bytes_per_sec {
            Err(observed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit() -> LowSpeedLimit {
        LowSpeedLimit {
            bytes_per_sec: 500,
            window: Duration::from_secs(20),
        }
    }

    #[test]
    fn test_window_not_closed_is_ok() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::new(limit(), start);
        assert!(meter.record(1, start + Duration::from_secs(5)).is_ok());
        assert!(meter.record(1, start + Duration::from_secs(19)).is_ok());
    }

    #[test]
    fn test_slow_window_is_reported() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::new(limit(), start);
        assert!(meter.record(100, start + Duration::from_secs(10)).is_ok());
        let observed = meter.record(100, start + Duration::from_secs(20)).unwrap_err();
        assert_eq!(observed, 10);
    }

    #[test]
    fn test_fast_window_resets() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::new(limit(), start);
        assert!(meter.record(20_000, start + Duration::from_secs(20)).is_ok());
        // A fresh window starts after the check, so a trickle shortly after is fine.
        assert!(meter.record(1, start + Duration::from_secs(21)).is_ok());
    }
}
