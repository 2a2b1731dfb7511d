//! Per-agent health-check loop: polls the deployer on an interval, demotes
//! `running -> degraded` after repeated failures, and attempts an automatic
//! restart after enough consecutive failures accrue.

use crate::manager::LifecycleManager;
use agentcore_types::{AgentId, AgentState, LifecycleEventKind, Liveness};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Consecutive failures after which `running` demotes to `degraded`.
const DEGRADE_THRESHOLD: u32 = 2;
/// Consecutive failures after which an automatic restart is attempted.
const AUTO_RESTART_THRESHOLD: u32 = 5;

impl LifecycleManager {
    /// Start (or replace) the health-check loop for `agent_id`. A prior
    /// loop for the same agent, if any, is aborted first.
    pub fn start_health_loop(self: &Arc<Self>, agent_id: AgentId) {
        self.stop_health_loop(agent_id);
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let interval = {
                    let Ok(handle) = manager.agent_handle(agent_id) else {
                        return;
                    };
                    let agent = handle.lock().await;
                    Duration::from_secs(agent.config.heartbeat.interval_secs.max(1))
                };
                tokio::time::sleep(interval).await;
                if manager.health_tick(agent_id).await.is_err() {
                    return;
                }
            }
        });
        self.health_tasks.insert(agent_id, handle);
    }

    /// Cancel the health-check loop for `agent_id`, if running.
    pub fn stop_health_loop(&self, agent_id: AgentId) {
        if let Some((_, handle)) = self.health_tasks.remove(&agent_id) {
            handle.abort();
        }
    }

    /// One health-check tick: probe the deployer, update `HealthStatus`,
    /// demote/auto-restart as thresholds dictate. Returns `Err` when the
    /// agent record is gone (caller should stop looping) or once it has
    /// left a state that wants a health loop.
    pub(crate) async fn health_tick(self: &Arc<Self>, agent_id: AgentId) -> Result<(), ()> {
        let handle = self.agent_handle(agent_id).map_err(|_| ())?;
        let mut agent = handle.lock().await;
        if !agent.state.wants_health_loop() {
            return Err(());
        }
        let deployer = match self.deployer_for_health(&agent) {
            Some(deployer) => deployer,
            None => return Err(()),
        };

        let probe = deployer.get_status(&agent.config).await;
        let healthy = matches!(&probe, Ok(report) if report.healthy);
        let uptime = probe.as_ref().ok().and_then(|report| report.uptime_secs);
        let detail = probe.as_ref().err().map(|err| err.to_string());

        if healthy {
            agent.health.record(Liveness::Healthy, uptime, None);
            if agent.state == AgentState::Degraded {
                agent.transition(AgentState::Running, "health check recovered", "system", None);
                let snapshot = agent.clone();
                drop(agent);
                self.persist(&snapshot).await;
                self.emit(&snapshot, LifecycleEventKind::AutoRecovered, serde_json::json!({})).await;
            }
            return Ok(());
        }

        agent.health.record(Liveness::Unhealthy, uptime, detail);
        let failures = agent.health.record_failure();

        if failures >= AUTO_RESTART_THRESHOLD {
            info!(agent_id = %agent_id, failures, "attempting automatic restart after repeated health-check failures");
            agent.health.consecutive_failures = 0;
            agent.transition(AgentState::Starting, "auto-restart after repeated failures", "system", None);
            let outcome = deployer.restart(&agent.config).await;
            if outcome.success {
                agent.transition(AgentState::Running, "auto-restart succeeded", "system", None);
                let snapshot = agent.clone();
                drop(agent);
                self.persist(&snapshot).await;
                self.emit(&snapshot, LifecycleEventKind::AutoRecovered, serde_json::json!({})).await;
                return Ok(());
            }
            let message = outcome.error.unwrap_or_else(|| "auto-restart failed".into());
            warn!(agent_id = %agent_id, error = %message, "automatic restart failed, giving up");
            agent.transition(AgentState::Error, message.clone(), "system", Some(message));
            let snapshot = agent.clone();
            drop(agent);
            self.persist(&snapshot).await;
            self.emit(&snapshot, LifecycleEventKind::Error, serde_json::json!({})).await;
            return Err(());
        }

        if failures >= DEGRADE_THRESHOLD && agent.state == AgentState::Running {
            agent.transition(AgentState::Degraded, "health checks failing", "system", None);
            let snapshot = agent.clone();
            drop(agent);
            self.persist(&snapshot).await;
            self.emit(&snapshot, LifecycleEventKind::Error, serde_json::json!({"degraded": true})).await;
        }
        Ok(())
    }

    fn deployer_for_health(&self, agent: &agentcore_types::ManagedAgent) -> Option<Arc<dyn agentcore_deploy::Deployer>> {
        agent.config.deployment.target.and_then(|target| self.deployers.get(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_budget::BudgetEnforcer;
    use agentcore_bus::EventBus;
    use agentcore_deploy::progress::NullProgressSink;
    use agentcore_deploy::{DeployOutcome, DeployerRegistry, StatusReport};
    use agentcore_store_memory::MemoryBackend;
    use agentcore_types::{
        AgentConfig, CoreError, DeploymentDescriptor, DeploymentTarget, HeartbeatPolicy, IdentityConfig,
        ModelRef, OrgId,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    #[derive(Default)]
    struct ScriptedDeployer {
        healthy_after_tick: AtomicU32,
        ticks: AtomicU32,
    }

    #[async_trait]
    impl agentcore_deploy::Deployer for ScriptedDeployer {
        async fn deploy(&self, _config: &AgentConfig, _progress: &dyn agentcore_deploy::progress::ProgressSink) -> DeployOutcome {
            DeployOutcome::ok()
        }
        async fn stop(&self, _config: &AgentConfig) -> DeployOutcome {
            DeployOutcome::ok()
        }
        async fn restart(&self, _config: &AgentConfig) -> DeployOutcome {
            DeployOutcome::ok()
        }
        async fn update_config(&self, _config: &AgentConfig) -> DeployOutcome {
            DeployOutcome::ok()
        }
        async fn get_status(&self, _config: &AgentConfig) -> Result<StatusReport, CoreError> {
            let tick = self.ticks.fetch_add(1, AtomicOrdering::SeqCst);
            let healthy = tick >= self.healthy_after_tick.load(AtomicOrdering::SeqCst);
            Ok(StatusReport {
                status: if healthy {
                    agentcore_deploy::DeployStatus::Running
                } else {
                    agentcore_deploy::DeployStatus::Running
                },
                healthy,
                uptime_secs: Some(tick as u64),
                metrics: Default::default(),
            })
        }
    }

    fn config() -> AgentConfig {
        AgentConfig {
            name: Some("health-bot".into()),
            display_name: Some("Health Bot".into()),
            identity: IdentityConfig {
                role: Some("assistant".into()),
                ..Default::default()
            },
            model: ModelRef {
                model_id: Some("model-x".into()),
                ..Default::default()
            },
            deployment: DeploymentDescriptor {
                target: Some(DeploymentTarget::Container),
                ..Default::default()
            },
            permission_profile_id: Some("default".into()),
            heartbeat: HeartbeatPolicy {
                interval_secs: 1,
                deploy_healthy_timeout_secs: 1,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn degrades_after_two_failures_then_recovers() {
        let deployer = Arc::new(ScriptedDeployer {
            healthy_after_tick: AtomicU32::new(u32::MAX),
            ticks: AtomicU32::new(0),
        });
        let registry = DeployerRegistry::new();
        registry.register("container", deployer.clone());
        let manager = LifecycleManager::new(EventBus::new(), registry, Arc::new(BudgetEnforcer::new()), None);
        manager.set_persistence(Arc::new(MemoryBackend::new())).await.unwrap();
        let agent = manager.create_agent(OrgId::new(), config()).await.unwrap();
        manager.deploy(agent.id).await.unwrap();
        assert_eq!(manager.get_agent(agent.id).await.unwrap().state, AgentState::Degraded);

        deployer.healthy_after_tick.store(0, AtomicOrdering::SeqCst);
        manager.health_tick(agent.id).await.unwrap();
        let recovered = manager.get_agent(agent.id).await.unwrap();
        assert_eq!(recovered.state, AgentState::Running);
        assert_eq!(recovered.health.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn sustained_failures_trigger_auto_restart() {
        let deployer = Arc::new(ScriptedDeployer {
            healthy_after_tick: AtomicU32::new(u32::MAX),
            ticks: AtomicU32::new(0),
        });
        let registry = DeployerRegistry::new();
        registry.register("container", deployer.clone());
        let manager = LifecycleManager::new(EventBus::new(), registry, Arc::new(BudgetEnforcer::new()), None);
        manager.set_persistence(Arc::new(MemoryBackend::new())).await.unwrap();
        let agent = manager.create_agent(OrgId::new(), config()).await.unwrap();
        manager.deploy(agent.id).await.unwrap();
        // `deploy` starts a background health loop on the same interval;
        // stop it so only these explicit ticks advance
        // `consecutive_failures` — otherwise the loop races the manual
        // ticks below and the threshold is reached nondeterministically.
        manager.stop_health_loop(agent.id);
        for _ in 0..5 {
            manager.health_tick(agent.id).await.unwrap();
        }
        let after = manager.get_agent(agent.id).await.unwrap();
        assert_eq!(after.state, AgentState::Running);
        let transitions: Vec<_> = after.state_history.iter().map(|t| t.to).collect();
        assert!(transitions.contains(&AgentState::Starting));
        assert!(transitions
            .iter()
            .filter(|s| **s == AgentState::Running)
            .count()
            >= 2);
    }
}
