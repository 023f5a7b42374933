//! Retry and backoff policy for the reconciliation loop.

use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

/// Timing and failure thresholds for the reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Sleep after a successful cycle.
    pub interval: Duration,
    /// Consecutive failures before entering backoff.
    pub max_consecutive_failures: u32,
    /// Sleep after a failed cycle.
    pub retry_delay: Duration,
    /// Sleep when the tunnel service is not running.
    pub inactive_service_delay: Duration,
    /// Backoff grows by this much per failure past the threshold.
    pub backoff_step: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            interval: 60 * MINUTE,
            max_consecutive_failures: 5,
            retry_delay: MINUTE,
            inactive_service_delay: 5 * MINUTE,
            backoff_step: 2 * MINUTE,
            max_backoff: 30 * MINUTE,
        }
    }
}

impl ReconcilePolicy {
    /// Default policy with the given success interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Backoff to take before the next cycle, if `failures` has reached the threshold.
    pub fn backoff_for(&self, failures: u32) -> Option<Duration> {
        if failures < self.max_consecutive_failures {
            return None;
        }
        let steps = failures - self.max_consecutive_failures + 1;
        Some(self.backoff_step.saturating_mul(steps).min(self.max_backoff))
    }

    /// Failure count to resume with after a backoff: two below the threshold,
    /// so one further failure does not immediately trigger another backoff.
    pub const fn failures_after_backoff(&self) -> u32 {
        self.max_consecutive_failures.saturating_sub(2)
    }

    /// Delay before the detached registration refresh.
    pub fn refresh_delay(&self) -> Duration {
        self.interval / 2
    }
}

/// Consecutive failure counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureState {
    consecutive: u32,
}

impl FailureState {
    pub const fn count(self) -> u32 {
        self.consecutive
    }

    /// Count one more failure and return the new total.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive = self.consecutive.saturating_add(1);
        self.consecutive
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Apply the post-backoff partial reset.
    pub fn after_backoff(&mut self, policy: &ReconcilePolicy) {
        self.consecutive = policy.failures_after_backoff();
    }
}
