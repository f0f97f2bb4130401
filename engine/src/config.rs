//! Engine tuning knobs.

use std::time::Duration;

/// Minimum interval between two delivered progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Free space below which a running transfer stops before the next mapping.
pub const DEFAULT_CRITICAL_SPACE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Configuration for a `TransferEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Throttle interval for progress reports
    pub progress_interval: Duration,

    /// Threshold in bytes used by the mid-run free-space check
    pub critical_space_threshold: u64,

    /// Whether `retry_failed` overwrites whatever is at the destination
    pub overwrite_on_retry: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            critical_space_threshold: DEFAULT_CRITICAL_SPACE_THRESHOLD,
            overwrite_on_retry: true,
        }
    }
}
