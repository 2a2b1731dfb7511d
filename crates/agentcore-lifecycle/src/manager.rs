//! `LifecycleManager`: the state graph, completeness/merge wiring, and the
//! deploy/stop/restart/hot-update/destroy/record-tool-call entry points.

use crate::birthday::BirthdayHook;
use agentcore_budget::{BudgetEnforcer, BudgetEvaluation, ToolCallUsage};
use agentcore_bus::EventBus;
use agentcore_deploy::progress::NullProgressSink;
use agentcore_deploy::{Deployer, DeployerRegistry};
use agentcore_resilience::{retry_with_backoff, BackoffPolicy};
use agentcore_store_core::PersistenceBackend;
use agentcore_types::{
    AgentConfig, AgentId, AgentState, AlertKind, ConfigPatch, CoreError, LifecycleEvent,
    LifecycleEventKind, Liveness, ManagedAgent, OrgId,
};
use chrono::{NaiveDate, Utc};
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex as TokioMutex, RwLock as TokioRwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Owns every `ManagedAgent` record and drives its state machine. See the
/// module documentation for the concurrency model.
pub struct LifecycleManager {
    pub(crate) agents: Arc<DashMap<AgentId, Arc<TokioMutex<ManagedAgent>>>>,
    pub(crate) persistence: Arc<TokioRwLock<Option<Arc<dyn PersistenceBackend>>>>,
    pub(crate) bus: EventBus,
    pub(crate) deployers: DeployerRegistry,
    pub(crate) budget: Arc<BudgetEnforcer>,
    pub(crate) health_tasks: Arc<DashMap<AgentId, JoinHandle<()>>>,
    pub(crate) dirty: Arc<DashSet<AgentId>>,
    pub(crate) flush_scheduled: Arc<AtomicBool>,
    pub(crate) flush_debounce: Duration,
    pub(crate) retry_policy: BackoffPolicy,
    pub(crate) birthday_task: StdMutex<Option<JoinHandle<()>>>,
    pub(crate) fired_birthdays: Arc<DashSet<(AgentId, NaiveDate)>>,
    pub(crate) birthday_hook: Option<Arc<dyn BirthdayHook>>,
}

impl LifecycleManager {
    /// Construct a manager with no agents and persistence not yet wired.
    /// Every mutating entry point returns `CoreError::Initializing` until
    /// `set_persistence` completes.
    pub fn new(
        bus: EventBus,
        deployers: DeployerRegistry,
        budget: Arc<BudgetEnforcer>,
        birthday_hook: Option<Arc<dyn BirthdayHook>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            agents: Arc::new(DashMap::new()),
            persistence: Arc::new(TokioRwLock::new(None)),
            bus,
            deployers,
            budget,
            health_tasks: Arc::new(DashMap::new()),
            dirty: Arc::new(DashSet::new()),
            flush_scheduled: Arc::new(AtomicBool::new(false)),
            flush_debounce: Duration::from_secs(5),
            retry_policy: BackoffPolicy::default(),
            birthday_task: StdMutex::new(None),
            fired_birthdays: Arc::new(DashSet::new()),
            birthday_hook,
        })
    }

    /// Install the persistence backend, load existing agents, restart
    /// health loops for any found `running`/`degraded`, and start the
    /// birthday scheduler. Per Design Notes §9's "late-bound persistence".
    pub async fn set_persistence(
        self: &Arc<Self>,
        backend: Arc<dyn PersistenceBackend>,
    ) -> Result<(), CoreError> {
        {
            let mut guard = self.persistence.write().await;
            *guard = Some(backend.clone());
        }
        let load = backend.clone();
        let agents = retry_with_backoff(self.retry_policy, move || load.get_all_managed_agents(), |_| true)
            .await
            .map_err(|err| CoreError::TransientExternal(err.to_string()))?;
        for agent in agents {
            let id = agent.id;
            let wants_loop = agent.state.wants_health_loop();
            self.agents.insert(id, Arc::new(TokioMutex::new(agent)));
            if wants_loop {
                self.start_health_loop(id);
            }
        }
        self.start_birthday_scheduler();
        Ok(())
    }

    async fn ensure_ready(&self) -> Result<(), CoreError> {
        if self.persistence.read().await.is_none() {
            Err(CoreError::Initializing)
        } else {
            Ok(())
        }
    }

    pub(crate) fn agent_handle(&self, id: AgentId) -> Result<Arc<TokioMutex<ManagedAgent>>, CoreError> {
        self.agents
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CoreError::NotFound(format!("agent {id} not found")))
    }

    /// Ids of every currently managed agent.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.iter().map(|entry| *entry.key()).collect()
    }

    pub(crate) async fn emit(&self, agent: &ManagedAgent, kind: LifecycleEventKind, data: serde_json::Value) {
        self.bus
            .emit(LifecycleEvent::new(agent.id, agent.org_id, kind, data))
            .await;
    }

    pub(crate) async fn persist(&self, agent: &ManagedAgent) {
        let Some(backend) = self.persistence.read().await.clone() else {
            return;
        };
        let to_upsert = agent.clone();
        let backend_for_upsert = backend.clone();
        let result = retry_with_backoff(
            self.retry_policy,
            move || {
                let backend = backend_for_upsert.clone();
                let agent = to_upsert.clone();
                async move { backend.upsert_managed_agent(&agent).await }
            },
            |_err| true,
        )
        .await;
        if let Err(err) = result {
            warn!(
                agent_id = %agent.id,
                error = %err,
                "exhausted retries persisting agent; in-memory state remains authoritative"
            );
            return;
        }
        if let Some(transition) = agent.state_history.last() {
            if let Err(err) = backend.add_state_transition(agent.id, transition).await {
                warn!(agent_id = %agent.id, error = %err, "failed to persist state transition");
            }
        }
    }

    pub(crate) fn mark_dirty(&self, id: AgentId) {
        self.dirty.insert(id);
        if self
            .flush_scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let agents = self.agents.clone();
            let persistence = self.persistence.clone();
            let dirty = self.dirty.clone();
            let flush_scheduled = self.flush_scheduled.clone();
            let debounce = self.flush_debounce;
            let retry_policy = self.retry_policy;
            tokio::spawn(async move {
                tokio::time::sleep(debounce).await;
                crate::flush::drain_dirty(&agents, &persistence, &dirty, retry_policy).await;
                flush_scheduled.store(false, Ordering::SeqCst);
            });
        }
    }

    fn deployer_for(&self, config: &AgentConfig) -> Result<Arc<dyn Deployer>, CoreError> {
        let target = config
            .deployment
            .target
            .ok_or_else(|| CoreError::Validation("deployment target not configured".into()))?;
        self.deployers
            .get(target)
            .ok_or_else(|| CoreError::TransientExternal(format!("no deployer registered for target {target:?}")))
    }

    /// Create a new agent record in `draft`, or `ready` if `config` is
    /// already complete.
    pub async fn create_agent(self: &Arc<Self>, org_id: OrgId, config: AgentConfig) -> Result<ManagedAgent, CoreError> {
        self.ensure_ready().await?;
        let id = AgentId::new();
        let mut agent = ManagedAgent::new(id, org_id, config);
        if agent.config.is_complete() {
            agent.transition(AgentState::Ready, "configuration complete at creation", "system", None);
        }
        let snapshot = agent.clone();
        self.agents.insert(id, Arc::new(TokioMutex::new(agent)));
        self.persist(&snapshot).await;
        self.emit(&snapshot, LifecycleEventKind::Created, serde_json::json!({})).await;
        Ok(snapshot)
    }

    /// Fetch a snapshot of one agent's current record.
    pub async fn get_agent(&self, id: AgentId) -> Result<ManagedAgent, CoreError> {
        let handle = self.agent_handle(id)?;
        Ok(handle.lock().await.clone())
    }

    /// Deep-merge `patch` into the agent's configuration (identity, model,
    /// deployment merged; the rest overlaid), bump `version`, and persist
    /// before returning. Promotes `draft -> ready` if the merged config is
    /// now complete.
    pub async fn update_config(self: &Arc<Self>, id: AgentId, patch: ConfigPatch) -> Result<ManagedAgent, CoreError> {
        self.ensure_ready().await?;
        let handle = self.agent_handle(id)?;
        let mut agent = handle.lock().await;
        agent.config = agent.config.merged_with(&patch);
        agent.touch();
        if agent.state == AgentState::Draft && agent.config.is_complete() {
            agent.transition(AgentState::Ready, "configuration complete", "system", None);
        }
        let snapshot = agent.clone();
        drop(agent);
        self.persist(&snapshot).await;
        self.emit(
            &snapshot,
            LifecycleEventKind::Updated,
            serde_json::json!({ "version": snapshot.version }),
        )
        .await;
        Ok(snapshot)
    }

    /// Provision, push configuration, and start the workload. Always
    /// settles the agent into a well-defined terminal state (`running`,
    /// `degraded`, or `error`) before returning `Ok`.
    pub async fn deploy(self: &Arc<Self>, id: AgentId) -> Result<ManagedAgent, CoreError> {
        self.ensure_ready().await?;
        let handle = self.agent_handle(id)?;
        let mut agent = handle.lock().await;
        if !agent.state.can_deploy() {
            return Err(CoreError::Conflict(format!(
                "cannot deploy agent in state {:?}",
                agent.state
            )));
        }
        let deployer = match self.deployer_for(&agent.config) {
            Ok(deployer) => deployer,
            Err(err) => {
                agent.transition(AgentState::Error, err.to_string(), "system", Some(err.to_string()));
                let snapshot = agent.clone();
                drop(agent);
                self.persist(&snapshot).await;
                self.emit(&snapshot, LifecycleEventKind::Error, serde_json::json!({})).await;
                return Ok(snapshot);
            }
        };
        agent.transition(AgentState::Provisioning, "deploy requested", "system", None);
        agent.transition(AgentState::Deploying, "pushing configuration", "system", None);
        let outcome = deployer.deploy(&agent.config, &NullProgressSink).await;
        if !outcome.success {
            let message = outcome.error.unwrap_or_else(|| "deploy failed".into());
            agent.transition(AgentState::Error, message.clone(), "system", Some(message));
            let snapshot = agent.clone();
            drop(agent);
            self.persist(&snapshot).await;
            self.emit(&snapshot, LifecycleEventKind::Error, serde_json::json!({})).await;
            return Ok(snapshot);
        }
        agent.transition(AgentState::Starting, "workload started", "system", None);
        self.wait_for_healthy_then_settle(&mut agent, &deployer).await;
        agent.last_deployed_at = Some(Utc::now());
        let snapshot = agent.clone();
        drop(agent);
        self.persist(&snapshot).await;
        self.emit(&snapshot, LifecycleEventKind::Deployed, serde_json::json!({})).await;
        if snapshot.state == AgentState::Running {
            self.emit(&snapshot, LifecycleEventKind::Started, serde_json::json!({})).await;
        }
        Ok(snapshot)
    }

    /// Best-effort graceful stop. Cancels the health-check loop first.
    pub async fn stop(self: &Arc<Self>, id: AgentId) -> Result<ManagedAgent, CoreError> {
        self.ensure_ready().await?;
        let handle = self.agent_handle(id)?;
        let mut agent = handle.lock().await;
        if !agent.state.can_stop() {
            return Err(CoreError::Conflict(format!(
                "cannot stop agent in state {:?}",
                agent.state
            )));
        }
        self.stop_health_loop(id);
        if let Ok(deployer) = self.deployer_for(&agent.config) {
            let _ = deployer.stop(&agent.config).await;
        }
        agent.transition(AgentState::Stopped, "stop requested", "system", None);
        let snapshot = agent.clone();
        drop(agent);
        self.persist(&snapshot).await;
        self.emit(&snapshot, LifecycleEventKind::Stopped, serde_json::json!({})).await;
        Ok(snapshot)
    }

    /// Stop then start idempotently, re-running the wait-for-healthy settle.
    pub async fn restart(self: &Arc<Self>, id: AgentId) -> Result<ManagedAgent, CoreError> {
        self.ensure_ready().await?;
        let handle = self.agent_handle(id)?;
        let mut agent = handle.lock().await;
        if !agent.state.can_stop() && !agent.state.can_deploy() {
            return Err(CoreError::Conflict(format!(
                "cannot restart agent in state {:?}",
                agent.state
            )));
        }
        let deployer = self.deployer_for(&agent.config)?;
        self.stop_health_loop(id);
        agent.transition(AgentState::Starting, "restart requested", "system", None);
        let outcome = deployer.restart(&agent.config).await;
        if !outcome.success {
            let message = outcome.error.unwrap_or_else(|| "restart failed".into());
            agent.transition(AgentState::Error, message.clone(), "system", Some(message));
            let snapshot = agent.clone();
            drop(agent);
            self.persist(&snapshot).await;
            self.emit(&snapshot, LifecycleEventKind::Error, serde_json::json!({})).await;
            return Ok(snapshot);
        }
        self.wait_for_healthy_then_settle(&mut agent, &deployer).await;
        agent.last_deployed_at = Some(Utc::now());
        let snapshot = agent.clone();
        drop(agent);
        self.persist(&snapshot).await;
        self.emit(&snapshot, LifecycleEventKind::Deployed, serde_json::json!({})).await;
        Ok(snapshot)
    }

    /// Apply a configuration patch to a running/degraded agent without a
    /// full redeploy. Preserves the prior terminal sub-state on success.
    pub async fn hot_update(self: &Arc<Self>, id: AgentId, patch: ConfigPatch) -> Result<ManagedAgent, CoreError> {
        self.ensure_ready().await?;
        let handle = self.agent_handle(id)?;
        let mut agent = handle.lock().await;
        if !agent.state.can_hot_update() {
            return Err(CoreError::Conflict(format!(
                "cannot hot-update agent in state {:?}",
                agent.state
            )));
        }
        let prior_state = agent.state;
        let deployer = self.deployer_for(&agent.config)?;
        agent.config = agent.config.merged_with(&patch);
        // Intermediate step only — does not bump `version`. The final
        // transition below (back to `prior_state` or to `Degraded`) is the
        // one logical mutation this call makes.
        agent.record_transition(AgentState::Updating, "hot update requested", "system", None);
        let outcome = deployer.update_config(&agent.config).await;
        if outcome.success {
            agent.transition(prior_state, "hot update applied", "system", None);
        } else {
            let message = outcome.error.unwrap_or_else(|| "hot update failed".into());
            agent.transition(
                AgentState::Degraded,
                format!("hot update failed: {message}"),
                "system",
                Some(message),
            );
        }
        let snapshot = agent.clone();
        drop(agent);
        self.persist(&snapshot).await;
        self.emit(
            &snapshot,
            LifecycleEventKind::Updated,
            serde_json::json!({ "version": snapshot.version }),
        )
        .await;
        Ok(snapshot)
    }

    /// Tear down an agent: best-effort stop, transition to `destroying`,
    /// then remove the record entirely. A second call on the same id sees
    /// no record and returns `not_found`, not a fatal error.
    pub async fn destroy(self: &Arc<Self>, id: AgentId) -> Result<(), CoreError> {
        self.ensure_ready().await?;
        let handle = self.agent_handle(id)?;
        let mut agent = handle.lock().await;
        if agent.state.is_destroying() {
            return Err(CoreError::NotFound(format!("agent {id} not found")));
        }
        self.stop_health_loop(id);
        if let Ok(deployer) = self.deployer_for(&agent.config) {
            let _ = deployer.stop(&agent.config).await;
        }
        agent.transition(AgentState::Destroying, "destroy requested", "system", None);
        let snapshot = agent.clone();
        drop(agent);
        self.persist(&snapshot).await;
        self.agents.remove(&id);
        self.budget.clear_fired_alerts_for(id);
        self.dirty.remove(&id);
        if let Some(backend) = self.persistence.read().await.clone() {
            let _ = backend.delete_managed_agent(id).await;
        }
        Ok(())
    }

    /// Apply a tool call's usage to the agent and evaluate budget rules,
    /// force-stopping the agent if a hard cap fired. Marks the agent dirty
    /// for the debounced usage flush regardless of outcome.
    pub async fn record_tool_call(
        self: &Arc<Self>,
        id: AgentId,
        usage: ToolCallUsage,
    ) -> Result<BudgetEvaluation, CoreError> {
        self.ensure_ready().await?;
        let handle = self.agent_handle(id)?;
        let mut agent = handle.lock().await;
        let evaluation = self.budget.record_tool_call(&mut agent, usage);
        let after_usage = agent.clone();
        self.mark_dirty(id);

        if let Some(backend) = self.persistence.read().await.clone() {
            for alert in &evaluation.alerts {
                if let Err(err) = backend.add_budget_alert(alert).await {
                    warn!(agent_id = %id, error = %err, "failed to persist budget alert");
                }
            }
        }
        for alert in &evaluation.alerts {
            if matches!(alert.kind, AlertKind::Warning(_)) {
                self.emit(
                    &after_usage,
                    LifecycleEventKind::BudgetWarning,
                    serde_json::json!({ "alert_kind": format!("{:?}", alert.kind) }),
                )
                .await;
            }
        }

        if let Some(reason) = evaluation.force_stop_reason.clone() {
            self.stop_health_loop(id);
            agent.transition(AgentState::Stopped, reason, "system", None);
            let snapshot = agent.clone();
            drop(agent);
            self.persist(&snapshot).await;
            self.emit(&snapshot, LifecycleEventKind::BudgetExceeded, serde_json::json!({})).await;
        } else {
            drop(agent);
        }
        self.emit(&after_usage, LifecycleEventKind::ToolCall, serde_json::json!({})).await;
        Ok(evaluation)
    }

    /// Reset the daily usage bucket for every agent and clear the per-day
    /// fired-alert set so the same warning can fire again tomorrow.
    pub async fn rollover_daily(self: &Arc<Self>) {
        self.budget.clear_all_fired_alerts();
        self.rollover(|usage| usage.rollover_daily()).await;
    }

    /// Reset the weekly usage bucket for every agent.
    pub async fn rollover_weekly(self: &Arc<Self>) {
        self.rollover(|usage| usage.rollover_weekly()).await;
    }

    /// Reset the monthly usage bucket (and legacy monthly fields) for every
    /// agent.
    pub async fn rollover_monthly(self: &Arc<Self>) {
        self.rollover(|usage| usage.rollover_monthly()).await;
    }

    /// Reset the annual usage bucket for every agent.
    pub async fn rollover_annual(self: &Arc<Self>) {
        self.rollover(|usage| usage.rollover_annual()).await;
    }

    async fn rollover(self: &Arc<Self>, apply: impl Fn(&mut agentcore_types::UsageCounters)) {
        let handles: Vec<_> = self.agents.iter().map(|entry| entry.value().clone()).collect();
        for handle in handles {
            let mut agent = handle.lock().await;
            apply(&mut agent.usage);
            agent.touch();
            let id = agent.id;
            drop(agent);
            self.mark_dirty(id);
        }
        info!("usage counters rolled over for {} agents", self.agents.len());
    }

    /// Stop the flush timer and birthday ticker, cancel every health-check
    /// loop, and attempt one last best-effort (non-retried) persistence
    /// pass for dirty agents.
    pub async fn shutdown(&self) {
        if let Some(handle) = self
            .birthday_task
            .lock()
            .expect("birthday task mutex poisoned")
            .take()
        {
            handle.abort();
        }
        for entry in self.health_tasks.iter() {
            entry.value().abort();
        }
        self.health_tasks.clear();

        let ids: Vec<AgentId> = self.dirty.iter().map(|entry| *entry).collect();
        let backend = self.persistence.read().await.clone();
        for id in ids {
            self.dirty.remove(&id);
            let Some(handle) = self.agents.get(&id).map(|entry| entry.value().clone()) else {
                continue;
            };
            let snapshot = handle.lock().await.clone();
            if let Some(backend) = &backend {
                let _ = backend.upsert_managed_agent(&snapshot).await;
            }
        }
    }

    pub(crate) async fn wait_for_healthy_then_settle(
        self: &Arc<Self>,
        agent: &mut ManagedAgent,
        deployer: &Arc<dyn Deployer>,
    ) {
        let timeout = Duration::from_secs(agent.config.heartbeat.deploy_healthy_timeout_secs.max(1));
        let poll_interval = Duration::from_secs(2).min(timeout);
        let deadline = tokio::time::Instant::now() + timeout;
        let mut became_healthy = false;
        loop {
            match deployer.get_status(&agent.config).await {
                Ok(report) => {
                    let liveness = if report.healthy { Liveness::Healthy } else { Liveness::Unhealthy };
                    agent.health.record(liveness, report.uptime_secs, None);
                    if report.healthy {
                        became_healthy = true;
                        break;
                    }
                }
                Err(_) => {
                    agent.health.record_failure();
                }
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(poll_interval).await;
        }
        if became_healthy {
            agent.transition(AgentState::Running, "healthy status observed after deploy", "system", None);
        } else {
            agent.transition(
                AgentState::Degraded,
                "no healthy status observed within deploy timeout",
                "system",
                None,
            );
        }
        self.start_health_loop(agent.id);
    }
}
