//! Circuit breaker: `closed -> open -> half-open -> closed`.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Current position of a circuit breaker in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests are admitted normally.
    Closed,
    /// Requests are rejected outright.
    Open,
    /// A single probe request is admitted to test recovery.
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
    probe_in_flight: bool,
}

/// A circuit breaker guarding calls to an unreliable dependency.
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_window: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Construct a breaker that opens after `failure_threshold` consecutive
    /// failures and stays open for `recovery_window_secs` before allowing a
    /// half-open probe.
    pub fn new(failure_threshold: u32, recovery_window_secs: i64) -> Self {
        Self {
            failure_threshold,
            recovery_window: Duration::seconds(recovery_window_secs),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Whether a call should be admitted right now. In `HalfOpen`, only one
    /// concurrent probe is admitted at a time.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed_ok = inner
                    .opened_at
                    .map(|opened| Utc::now() - opened >= self.recovery_window)
                    .unwrap_or(false);
                if elapsed_ok {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Report the outcome of an admitted call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.consecutive_failures = 0;
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    /// Report the outcome of an admitted call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.probe_in_flight = false;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Utc::now());
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Utc::now());
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Current state, for observability.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker mutex poisoned").state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration as StdDuration;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(3, 60);
        for _ in 0..3 {
            assert!(breaker.allow());
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn half_open_admits_single_probe() {
        let breaker = CircuitBreaker::new(1, 0);
        assert!(breaker.allow());
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        sleep(StdDuration::from_millis(5));
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(!breaker.allow());
    }

    #[test]
    fn successful_probe_closes_circuit() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.allow();
        breaker.record_failure();
        sleep(StdDuration::from_millis(5));
        assert!(breaker.allow());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
