#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **agentcore-deploy** – Target-agnostic deployment orchestrator for the
//! Agent Lifecycle & Runtime Core.
//!
//! Defines the uniform `Deployer` trait and a registry that dispatches on
//! `AgentConfig::deployment::target`, generalizing
//! `toka-store-core`'s feature-gated backend-selection pattern
//! (`StorageConfig` enum -> concrete backend) to a runtime adapter
//! registry, and borrowing the progress-sink shape from
//! `toka-agent-runtime::executor`'s progress-reporting hooks.

pub mod adapters;
pub mod progress;
pub mod registry;

use agentcore_types::{AgentConfig, CoreError};
use async_trait::async_trait;
use progress::ProgressSink;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use registry::DeployerRegistry;

/// Outcome status of a deployed workload as reported by `get_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    /// Provisioning/starting, not yet serving.
    Pending,
    /// Serving traffic.
    Running,
    /// Stopped, not serving.
    Stopped,
    /// In an error state.
    Error,
}

/// Result of a `deploy` / `stop` / `restart` / `update_config` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOutcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error detail, if `success` is `false`.
    pub error: Option<String>,
}

impl DeployOutcome {
    /// Construct a successful outcome.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Construct a failed outcome with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Per-agent runtime metrics surfaced by a status probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployMetrics {
    /// Free-form numeric metrics keyed by name (cpu_percent, mem_mb, ...).
    pub values: HashMap<String, f64>,
}

/// A status report returned by `get_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// Workload status.
    pub status: DeployStatus,
    /// Whether the most recent probe considered the workload healthy.
    pub healthy: bool,
    /// Uptime in seconds, if known.
    pub uptime_secs: Option<u64>,
    /// Metrics collected alongside the status probe.
    pub metrics: DeployMetrics,
}

/// Uniform interface implemented by every deployment target adapter.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Provision resources, push configuration, and start the workload.
    /// Reports phased progress via `progress`.
    async fn deploy(&self, config: &AgentConfig, progress: &dyn ProgressSink) -> DeployOutcome;

    /// Best-effort graceful stop.
    async fn stop(&self, config: &AgentConfig) -> DeployOutcome;

    /// Stop then start, idempotently.
    async fn restart(&self, config: &AgentConfig) -> DeployOutcome;

    /// Apply configuration to a running workload in place if supported;
    /// otherwise equivalent to `restart`.
    async fn update_config(&self, config: &AgentConfig) -> DeployOutcome;

    /// Query current status, health, uptime, and metrics.
    async fn get_status(&self, config: &AgentConfig) -> Result<StatusReport, CoreError>;
}
