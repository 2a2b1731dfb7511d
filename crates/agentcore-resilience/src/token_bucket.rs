//! Token-bucket rate limiter.
//!
//! Generalized from `toka-rate-limiter::algorithms::TokenBucketState`'s
//! refill/consume logic: tokens accrue continuously at `refill_rate` per
//! `refill_interval_ms` and are drawn down by `try_consume`.

use chrono::Utc;
use std::sync::Mutex;

/// A single-key token bucket. Thread-safe via an internal mutex.
pub struct TokenBucket {
    max_tokens: f64,
    refill_rate: f64,
    refill_interval_ms: u64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill_ms: i64,
}

impl TokenBucket {
    /// Construct a bucket starting full, refilling `refill_rate` tokens
    /// every `refill_interval_ms` milliseconds, capped at `max_tokens`.
    pub fn new(max_tokens: u64, refill_rate: u64, refill_interval_ms: u64) -> Self {
        Self {
            max_tokens: max_tokens as f64,
            refill_rate: refill_rate as f64,
            refill_interval_ms: refill_interval_ms.max(1),
            state: Mutex::new(BucketState {
                tokens: max_tokens as f64,
                last_refill_ms: Utc::now().timestamp_millis(),
            }),
        }
    }

    /// Attempt to consume a single token. Returns `true` if allowed.
    pub fn try_consume(&self) -> bool {
        self.try_consume_n(1.0)
    }

    /// Attempt to consume `amount` tokens atomically.
    pub fn try_consume_n(&self, amount: f64) -> bool {
        let mut state = self.state.lock().expect("token bucket mutex poisoned");
        let now_ms = Utc::now().timestamp_millis();
        let elapsed_ms = (now_ms - state.last_refill_ms).max(0) as f64;
        let intervals = elapsed_ms / self.refill_interval_ms as f64;
        let refill = intervals * self.refill_rate;
        if refill > 0.0 {
            state.tokens = (state.tokens + refill).min(self.max_tokens);
            state.last_refill_ms = now_ms;
        }
        if state.tokens >= amount {
            state.tokens -= amount;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration as StdDuration;

    #[test]
    fn consumes_up_to_capacity_then_denies() {
        let bucket = TokenBucket::new(3, 0, 1_000);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
    }

    #[test]
    fn refills_after_idle_interval() {
        let bucket = TokenBucket::new(2, 2, 50);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
        sleep(StdDuration::from_millis(120));
        assert!(bucket.try_consume());
    }

    #[test]
    fn idle_for_full_refill_window_allows_max_tokens_consecutively() {
        let bucket = TokenBucket::new(5, 5, 10);
        sleep(StdDuration::from_millis(15));
        for _ in 0..5 {
            assert!(bucket.try_consume());
        }
        assert!(!bucket.try_consume());
    }
}
