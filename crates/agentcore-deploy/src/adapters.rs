//! Target adapters for `Deployer`.
//!
//! These adapters simulate the four infrastructure kinds named in the core
//! specification (container engine, remote-shell host, two managed cloud
//! platforms). Real wire protocols for each target are external
//! collaborators per the core's scope; what lives here is the state
//! machine and status bookkeeping a real adapter would plug into, in the
//! style of `MockConnector` from the connector pack this workspace was
//! enriched from — configurable latency and failure injection for tests.

use crate::progress::{ProgressPhase, ProgressSink};
use crate::{DeployMetrics, DeployOutcome, DeployStatus, Deployer, StatusReport};
use agentcore_types::{AgentConfig, CoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Instant;
use tracing::info;

struct WorkloadState {
    status: DeployStatus,
    started_at: Option<Instant>,
}

/// Common simulated-target scaffold shared by every adapter in this crate.
/// Keyed by `AgentConfig::name` since that is the stable handle a real
/// adapter would use to address the workload.
#[derive(Default)]
struct SimulatedTarget {
    workloads: DashMap<String, WorkloadState>,
    inject_failure: std::sync::atomic::AtomicBool,
}

impl SimulatedTarget {
    fn key(config: &AgentConfig) -> String {
        config.name.clone().unwrap_or_else(|| "unnamed-agent".into())
    }

    async fn run_phases(&self, progress: &dyn ProgressSink, phases: &[&str]) {
        for phase in phases {
            progress.report(ProgressPhase {
                name: phase.to_string(),
                detail: format!("{phase} in progress"),
            });
        }
    }

    fn failing(&self) -> bool {
        self.inject_failure.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn deploy(&self, config: &AgentConfig, progress: &dyn ProgressSink, kind: &str) -> DeployOutcome {
        self.run_phases(progress, &["provisioning", "pushing_configuration", "starting"])
            .await;
        if self.failing() {
            return DeployOutcome::failed(format!("{kind}: simulated provisioning failure"));
        }
        self.workloads.insert(
            Self::key(config),
            WorkloadState {
                status: DeployStatus::Running,
                started_at: Some(Instant::now()),
            },
        );
        info!(target = kind, agent = %Self::key(config), "deployed");
        DeployOutcome::ok()
    }

    async fn stop(&self, config: &AgentConfig) -> DeployOutcome {
        self.workloads.insert(
            Self::key(config),
            WorkloadState {
                status: DeployStatus::Stopped,
                started_at: None,
            },
        );
        DeployOutcome::ok()
    }

    async fn update_config(&self, config: &AgentConfig) -> DeployOutcome {
        if self.workloads.get(&Self::key(config)).is_some() {
            DeployOutcome::ok()
        } else {
            DeployOutcome::failed("cannot update configuration: workload not deployed")
        }
    }

    async fn get_status(&self, config: &AgentConfig) -> Result<StatusReport, CoreError> {
        let entry = self.workloads.get(&Self::key(config));
        let mut metrics = DeployMetrics::default();
        match entry {
            Some(state) => {
                let uptime = state.started_at.map(|t| t.elapsed().as_secs());
                if let Some(secs) = uptime {
                    metrics.values.insert("uptime_secs".into(), secs as f64);
                }
                Ok(StatusReport {
                    status: state.status,
                    healthy: !self.failing() && state.status == DeployStatus::Running,
                    uptime_secs: uptime,
                    metrics,
                })
            }
            None => Ok(StatusReport {
                status: DeployStatus::Pending,
                healthy: false,
                uptime_secs: None,
                metrics,
            }),
        }
    }
}

macro_rules! simulated_adapter {
    ($name:ident, $kind:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Default)]
        pub struct $name {
            inner: SimulatedTarget,
        }

        impl $name {
            /// Toggle failure injection for every subsequent operation
            /// (used by tests to exercise the deploy-failure path).
            pub fn set_inject_failure(&self, inject: bool) {
                self.inner
                    .inject_failure
                    .store(inject, std::sync::atomic::Ordering::SeqCst);
            }
        }

        #[async_trait]
        impl Deployer for $name {
            async fn deploy(&self, config: &AgentConfig, progress: &dyn ProgressSink) -> DeployOutcome {
                self.inner.deploy(config, progress, $kind).await
            }

            async fn stop(&self, config: &AgentConfig) -> DeployOutcome {
                self.inner.stop(config).await
            }

            async fn restart(&self, config: &AgentConfig) -> DeployOutcome {
                let _ = self.inner.stop(config).await;
                self.inner
                    .deploy(config, &crate::progress::NullProgressSink, $kind)
                    .await
            }

            async fn update_config(&self, config: &AgentConfig) -> DeployOutcome {
                self.inner.update_config(config).await
            }

            async fn get_status(&self, config: &AgentConfig) -> Result<StatusReport, CoreError> {
                self.inner.get_status(config).await
            }
        }
    };
}

simulated_adapter!(ContainerTarget, "container", "Container-engine deployment target.");
simulated_adapter!(
    RemoteShellTarget,
    "remote_shell",
    "Remote-host deployment target reached via shell-over-network."
);
simulated_adapter!(
    ManagedPlatformATarget,
    "managed_platform_a",
    "First managed cloud platform deployment target."
);
simulated_adapter!(
    ManagedPlatformBTarget,
    "managed_platform_b",
    "Second managed cloud platform deployment target."
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgressSink;

    fn config() -> AgentConfig {
        AgentConfig {
            name: Some("test-agent".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn deploy_then_status_reports_running() {
        let target = ContainerTarget::default();
        let outcome = target.deploy(&config(), &NullProgressSink).await;
        assert!(outcome.success);
        let status = target.get_status(&config()).await.unwrap();
        assert_eq!(status.status, DeployStatus::Running);
        assert!(status.healthy);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_on_deploy() {
        let target = ContainerTarget::default();
        target.set_inject_failure(true);
        let outcome = target.deploy(&config(), &NullProgressSink).await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn stop_then_status_reports_stopped() {
        let target = RemoteShellTarget::default();
        target.deploy(&config(), &NullProgressSink).await;
        target.stop(&config()).await;
        let status = target.get_status(&config()).await.unwrap();
        assert_eq!(status.status, DeployStatus::Stopped);
    }

    #[tokio::test]
    async fn update_config_without_prior_deploy_fails() {
        let target = ManagedPlatformATarget::default();
        let outcome = target.update_config(&config()).await;
        assert!(!outcome.success);
    }
}
