//! Runtime session records, owned exclusively by the gateway.

use crate::ids::{AgentId, OrgId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lifecycle state of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Spawned but not yet confirmed active.
    Pending,
    /// Actively exchanging messages.
    Running,
    /// Terminated on request or cleanly finished.
    Terminated,
    /// Ended due to an unrecoverable error.
    Error,
}

/// A live conversation between a client and a deployed agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Stable identifier.
    pub id: SessionId,
    /// Agent this session is hosted by.
    pub agent_id: AgentId,
    /// Owning organization, if known.
    pub org_id: Option<OrgId>,
    /// Current status.
    pub status: SessionStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Opaque reference to the message log (owned by a collaborator).
    pub message_log_ref: String,
    /// Id of the parent session, if this session was spawned as a sub-agent.
    pub parent_session_id: Option<SessionId>,
}
