//! The lifecycle state graph and the managed-agent record that carries it.

use crate::config::AgentConfig;
use crate::health::HealthStatus;
use crate::ids::{AgentId, OrgId};
use crate::usage::{BudgetConfig, UsageCounters};
use crate::STATE_HISTORY_CAP;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The twelve states a managed agent can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Newly created, configuration not yet complete.
    Draft,
    /// Configuration is being edited.
    Configuring,
    /// Configuration is complete and deployable.
    Ready,
    /// Infrastructure is being provisioned.
    Provisioning,
    /// Configuration/code is being pushed to the target.
    Deploying,
    /// The workload has been started and is warming up.
    Starting,
    /// The workload is running and healthy.
    Running,
    /// The workload is running but failing health checks.
    Degraded,
    /// The workload has been stopped.
    Stopped,
    /// A terminal or unrecoverable error occurred.
    Error,
    /// A hot configuration update is in flight.
    Updating,
    /// The agent is being torn down.
    Destroying,
}

impl AgentState {
    /// Whether a health-check loop should be running while in this state.
    pub fn wants_health_loop(&self) -> bool {
        matches!(self, AgentState::Running | AgentState::Degraded)
    }

    /// Whether this state is a legal source for a `stop` transition.
    pub fn can_stop(&self) -> bool {
        matches!(
            self,
            AgentState::Running | AgentState::Degraded | AgentState::Starting | AgentState::Error
        )
    }

    /// Whether this state is a legal source for a `deploy` transition.
    pub fn can_deploy(&self) -> bool {
        matches!(
            self,
            AgentState::Ready | AgentState::Stopped | AgentState::Error
        )
    }

    /// Whether this state is a legal source for a `hot_update` transition.
    pub fn can_hot_update(&self) -> bool {
        matches!(self, AgentState::Running | AgentState::Degraded)
    }

    /// Whether the agent is already mid-teardown (destroy is then illegal).
    pub fn is_destroying(&self) -> bool {
        matches!(self, AgentState::Destroying)
    }
}

/// A single recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// State transitioned from.
    pub from: AgentState,
    /// State transitioned to.
    pub to: AgentState,
    /// Human-readable reason for the transition.
    pub reason: String,
    /// Who (or what) triggered this transition. `"system"` for
    /// internally-driven transitions (health loop, scheduler).
    pub triggered_by: String,
    /// When the transition was recorded.
    pub timestamp: DateTime<Utc>,
    /// Error detail, if the transition was error-driven.
    pub error: Option<String>,
}

/// Bounded, append-only, first-in-evicted transition history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    entries: VecDeque<StateTransition>,
}

impl StateHistory {
    /// Append a transition, evicting the oldest entry if at capacity.
    pub fn push(&mut self, transition: StateTransition) {
        if self.entries.len() >= STATE_HISTORY_CAP {
            self.entries.pop_front();
        }
        self.entries.push_back(transition);
    }

    /// Iterate transitions oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &StateTransition> {
        self.entries.iter()
    }

    /// Number of transitions currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any transitions have been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recently recorded transition, if any.
    pub fn last(&self) -> Option<&StateTransition> {
        self.entries.back()
    }
}

/// The authoritative, persisted record of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedAgent {
    /// Stable identifier.
    pub id: AgentId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Current configuration snapshot.
    pub config: AgentConfig,
    /// Current lifecycle state.
    pub state: AgentState,
    /// Bounded history of past transitions.
    pub state_history: StateHistory,
    /// Current health status.
    pub health: HealthStatus,
    /// Usage counters (tokens, cost, tool calls, sessions, errors).
    pub usage: UsageCounters,
    /// Optional per-agent budget configuration.
    pub budget: Option<BudgetConfig>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Timestamp of the last successful deploy, if any.
    pub last_deployed_at: Option<DateTime<Utc>>,
    /// Monotonically non-decreasing version, bumped on every accepted update.
    pub version: u64,
}

impl ManagedAgent {
    /// Construct a brand-new agent record in the `draft` state.
    pub fn new(id: AgentId, org_id: OrgId, config: AgentConfig) -> Self {
        let now = Utc::now();
        Self {
            id,
            org_id,
            config,
            state: AgentState::Draft,
            state_history: StateHistory::default(),
            health: HealthStatus::default(),
            usage: UsageCounters::default(),
            budget: None,
            created_at: now,
            updated_at: now,
            last_deployed_at: None,
            version: 0,
        }
    }

    /// Record a state transition and update `state`/`updated_at`/`version`
    /// atomically with respect to the caller (the lifecycle manager holds
    /// the per-agent lock across this call).
    pub fn transition(
        &mut self,
        to: AgentState,
        reason: impl Into<String>,
        triggered_by: impl Into<String>,
        error: Option<String>,
    ) {
        self.record_transition(to, reason, triggered_by, error);
        self.touch();
    }

    /// Record a state transition without bumping `version`/`updated_at`.
    /// For multi-step mutations (e.g. hot-update's intermediate pass
    /// through `Updating` on the way to a terminal state) where only the
    /// sequence's final step should count as the logical version bump —
    /// callers chain this with a final `transition` call.
    pub fn record_transition(
        &mut self,
        to: AgentState,
        reason: impl Into<String>,
        triggered_by: impl Into<String>,
        error: Option<String>,
    ) {
        let transition = StateTransition {
            from: self.state,
            to,
            reason: reason.into(),
            triggered_by: triggered_by.into(),
            timestamp: Utc::now(),
            error,
        };
        self.state_history.push(transition);
        self.state = to;
    }

    /// Bump `version` and refresh `updated_at`. Called by every accepted
    /// mutation, whether or not the state itself changed.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;

    #[test]
    fn history_never_exceeds_cap() {
        let mut agent = ManagedAgent::new(AgentId::new(), OrgId::new(), AgentConfig::default());
        for i in 0..(STATE_HISTORY_CAP + 25) {
            agent.transition(AgentState::Ready, format!("t{i}"), "system", None);
        }
        assert_eq!(agent.state_history.len(), STATE_HISTORY_CAP);
    }

    #[test]
    fn version_increments_on_touch() {
        let mut agent = ManagedAgent::new(AgentId::new(), OrgId::new(), AgentConfig::default());
        let v0 = agent.version;
        agent.touch();
        assert_eq!(agent.version, v0 + 1);
    }
}
