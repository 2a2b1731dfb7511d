#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **agentcore-resilience** – Retry-with-backoff, token-bucket rate
//! limiting, circuit breaking, and a small health-monitor scaffold, shared
//! across the Agent Lifecycle & Runtime Core.
//!
//! The token bucket is generalized from
//! `toka-rate-limiter::algorithms::TokenBucketLimiter`'s refill/consume
//! shape into a target-agnostic primitive with no storage dependency.

pub mod backoff;
pub mod breaker;
pub mod health_monitor;
pub mod token_bucket;

pub use backoff::{retry_with_backoff, BackoffPolicy, RetryError};
pub use breaker::{CircuitBreaker, CircuitState};
pub use health_monitor::HealthMonitor;
pub use token_bucket::TokenBucket;
