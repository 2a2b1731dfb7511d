//! Health status as maintained by the lifecycle manager's health-check loop.

use crate::HEALTH_HISTORY_CAP;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Rolling liveness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// Last observation (or absence of one) indicates health.
    Healthy,
    /// Degraded but still serving.
    Degraded,
    /// Failing health checks.
    Unhealthy,
    /// No observation has been made yet.
    Unknown,
}

impl Default for Liveness {
    fn default() -> Self {
        Liveness::Unknown
    }
}

/// A single recorded health probe outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Liveness observed at this tick.
    pub liveness: Liveness,
    /// When the probe was taken.
    pub at: DateTime<Utc>,
    /// Optional detail (e.g. error message from the deployer).
    pub detail: Option<String>,
}

/// The agent's current health record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Current rolling liveness label.
    pub liveness: Liveness,
    /// Timestamp of the last check, if any.
    pub last_check_at: Option<DateTime<Utc>>,
    /// Uptime in seconds as last reported by the deployer.
    pub uptime_secs: Option<u64>,
    /// Consecutive failed checks since the last healthy observation.
    pub consecutive_failures: u32,
    /// Bounded ring of the most recent checks, oldest first.
    pub recent_checks: VecDeque<HealthCheckResult>,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            liveness: Liveness::Unknown,
            last_check_at: None,
            uptime_secs: None,
            consecutive_failures: 0,
            recent_checks: VecDeque::new(),
        }
    }
}

impl HealthStatus {
    /// Record a probe outcome: push to the bounded ring, update
    /// `last_check_at`, and reset `consecutive_failures` on a healthy
    /// observation.
    pub fn record(&mut self, liveness: Liveness, uptime_secs: Option<u64>, detail: Option<String>) {
        let now = Utc::now();
        if self.recent_checks.len() >= HEALTH_HISTORY_CAP {
            self.recent_checks.pop_front();
        }
        self.recent_checks.push_back(HealthCheckResult {
            liveness,
            at: now,
            detail,
        });
        self.liveness = liveness;
        self.last_check_at = Some(now);
        if let Some(uptime) = uptime_secs {
            self.uptime_secs = Some(uptime);
        }
        if liveness == Liveness::Healthy {
            self.consecutive_failures = 0;
        }
    }

    /// Increment the consecutive-failure counter for an unhealthy observation.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_observation_resets_failures() {
        let mut health = HealthStatus::default();
        health.record_failure();
        health.record_failure();
        assert_eq!(health.consecutive_failures, 2);
        health.record(Liveness::Healthy, Some(10), None);
        assert_eq!(health.consecutive_failures, 0);
    }

    #[test]
    fn recent_checks_bounded() {
        let mut health = HealthStatus::default();
        for _ in 0..(HEALTH_HISTORY_CAP + 5) {
            health.record(Liveness::Healthy, None, None);
        }
        assert_eq!(health.recent_checks.len(), HEALTH_HISTORY_CAP);
    }
}
