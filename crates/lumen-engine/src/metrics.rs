//! Metrics collection for refresh cycles

use serde::Serialize;
use std::time::Duration;

/// Metrics collected by the refresh scheduler
///
/// Tracks completed, failed and dropped refresh cycles and their runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshMetrics {
    /// Refresh cycles that reached the source (success or failure)
    pub cycles: u64,

    /// Cycles that replaced the cached snapshot
    pub successes: u64,

    /// Cycles that failed and kept the previous snapshot
    pub failures: u64,

    /// Ticks or triggers dropped because a fetch was already running
    pub skipped: u64,

    /// Failures since the last success
    pub consecutive_failures: u64,

    /// Duration of the most recent cycle in milliseconds
    pub last_cycle_ms: u64,

    /// Total time spent fetching in milliseconds
    pub total_runtime_ms: u64,
}

impl RefreshMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    fn record_cycle(&mut self, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.cycles += 1;
        self.last_cycle_ms = ms;
        self.total_runtime_ms = self.total_runtime_ms.saturating_add(ms);
    }

    /// Record a successful refresh
    pub fn record_success(&mut self, elapsed: Duration) {
        self.record_cycle(elapsed);
        self.successes += 1;
        self.consecutive_failures = 0;
    }

    /// Record a failed refresh
    pub fn record_failure(&mut self, elapsed: Duration) {
        self.record_cycle(elapsed);
        self.failures += 1;
        self.consecutive_failures += 1;
    }

    /// Record a dropped tick
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Refresh Metrics Summary".to_string(),
            "=======================".to_string(),
            format!("Cycles: {}", self.cycles),
            format!("Succeeded: {}", self.successes),
            format!("Failed: {}", self.failures),
            format!("Dropped ticks: {}", self.skipped),
            format!("Total runtime: {}ms", self.total_runtime_ms),
        ];

        if self.consecutive_failures > 0 {
            lines.push(format!(
                "Serving stale data after {} consecutive failures",
                self.consecutive_failures
            ));
        }

        lines.join("\n")
    }
}
