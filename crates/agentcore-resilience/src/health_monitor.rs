//! A small bounded pass/fail ring, reused by the lifecycle health-check
//! loop to track raw probe outcomes independent of the richer
//! `agentcore-types::HealthStatus` record.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Bounded ring of recent boolean probe outcomes.
pub struct HealthMonitor {
    capacity: usize,
    outcomes: Mutex<VecDeque<bool>>,
}

impl HealthMonitor {
    /// Construct a monitor retaining up to `capacity` recent outcomes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a probe outcome.
    pub fn record(&self, healthy: bool) {
        let mut outcomes = self.outcomes.lock().expect("health monitor mutex poisoned");
        if outcomes.len() >= self.capacity {
            outcomes.pop_front();
        }
        outcomes.push_back(healthy);
    }

    /// Fraction of recorded outcomes that were healthy, in `[0.0, 1.0]`.
    /// Returns `1.0` when no outcomes have been recorded yet.
    pub fn healthy_ratio(&self) -> f64 {
        let outcomes = self.outcomes.lock().expect("health monitor mutex poisoned");
        if outcomes.is_empty() {
            return 1.0;
        }
        let healthy = outcomes.iter().filter(|ok| **ok).count();
        healthy as f64 / outcomes.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_reflects_recent_window() {
        let monitor = HealthMonitor::new(4);
        monitor.record(true);
        monitor.record(true);
        monitor.record(false);
        monitor.record(false);
        assert!((monitor.healthy_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn window_is_bounded() {
        let monitor = HealthMonitor::new(2);
        monitor.record(false);
        monitor.record(true);
        monitor.record(true);
        assert!((monitor.healthy_ratio() - 1.0).abs() < f64::EPSILON);
    }
}
