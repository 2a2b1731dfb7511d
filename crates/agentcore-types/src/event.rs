//! Lifecycle events emitted to subscribers on every substantive action.
//!
//! Not persisted by the core; persistence of derived facts (state
//! transitions, budget alerts) happens through the dedicated persistence
//! calls, not through the event stream.

use crate::ids::{AgentId, OrgId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of occurrence a `LifecycleEvent` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    /// A new agent record was created.
    Created,
    /// A deploy operation completed (successfully or not).
    Deployed,
    /// The agent transitioned into `running`.
    Started,
    /// The agent transitioned into `stopped`.
    Stopped,
    /// The agent's configuration was updated.
    Updated,
    /// A fatal or transition-level error occurred.
    Error,
    /// A budget warning threshold was crossed.
    BudgetWarning,
    /// A budget cap was exceeded and the agent was force-stopped.
    BudgetExceeded,
    /// The health loop promoted the agent back to a healthy state, or
    /// completed a restart.
    AutoRecovered,
    /// The agent's identity has a birthday today.
    Birthday,
    /// A tool call was recorded.
    ToolCall,
}

/// A structured notification of a state change or significant occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Stable identifier.
    pub id: uuid::Uuid,
    /// Agent this event concerns.
    pub agent_id: AgentId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Kind of event.
    pub kind: LifecycleEventKind,
    /// Arbitrary structured payload, shape depends on `kind`.
    pub data: Value,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Construct a new event with a fresh id and the current timestamp.
    pub fn new(agent_id: AgentId, org_id: OrgId, kind: LifecycleEventKind, data: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            agent_id,
            org_id,
            kind,
            data,
            timestamp: Utc::now(),
        }
    }
}
