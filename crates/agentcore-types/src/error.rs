//! Core error kinds shared by every lifecycle entry point.
//!
//! Mirrors the five kinds named in the error handling design: validation,
//! not-found, conflict, transient-external, and fatal.

use thiserror::Error;

/// Unified error type returned by core entry points.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed validation and was rejected immediately.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is illegal given the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A downstream dependency (deployer, persistence) failed transiently.
    #[error("transient external error: {0}")]
    TransientExternal(String),

    /// An invariant was violated. The affected agent, if any, should be
    /// transitioned to `error` by the caller.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// The manager has not finished wiring up persistence yet.
    #[error("core is still initializing")]
    Initializing,
}

impl CoreError {
    /// Returns `true` if this error represents a caller-correctable
    /// validation problem (useful for HTTP status mapping upstream).
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }
}
