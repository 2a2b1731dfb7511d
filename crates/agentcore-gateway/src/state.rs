//! Shared gateway state: the session table, the per-session event hub, and
//! the handles to the collaborating crates (lifecycle manager, permission
//! resolver, LLM hook).

use crate::events::SessionHub;
use agentcore_lifecycle::LifecycleManager;
use agentcore_llm::LlmHook;
use agentcore_permissions::PermissionResolver;
use agentcore_types::{AgentId, OrgId, Session, SessionId, SessionStatus};
use dashmap::DashMap;
use std::sync::Arc;

/// A single logged turn in a session's conversation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    /// `"user"` or `"agent"`.
    pub role: String,
    /// Turn content.
    pub content: String,
    /// When the turn was recorded.
    pub at: chrono::DateTime<chrono::Utc>,
}

/// Shared state behind every gateway handler. The gateway is the exclusive
/// owner of `Session` records; the lifecycle manager owns agents.
pub struct GatewayState {
    /// The lifecycle state machine, shared with the rest of the process.
    pub lifecycle: Arc<LifecycleManager>,
    /// Tool-call permission resolver.
    pub permissions: Arc<PermissionResolver>,
    /// Model invocation hook, absent in deployments with no configured
    /// provider (handlers degrade to echoing the inbound message).
    pub llm: Option<Arc<dyn LlmHook>>,
    /// Live and recently-terminated session records, keyed by id.
    pub sessions: Arc<DashMap<SessionId, Session>>,
    /// Append-only per-session message log.
    pub messages: Arc<DashMap<SessionId, Vec<ChatMessage>>>,
    /// Per-session server-sent-event fan-out.
    pub hub: Arc<SessionHub>,
}

impl GatewayState {
    /// Construct gateway state wired to an already-initialized lifecycle
    /// manager and permission resolver.
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        permissions: Arc<PermissionResolver>,
        llm: Option<Arc<dyn LlmHook>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            lifecycle,
            permissions,
            llm,
            sessions: Arc::new(DashMap::new()),
            messages: Arc::new(DashMap::new()),
            hub: Arc::new(SessionHub::new()),
        })
    }

    /// Create and register a new `Session` record in `pending`.
    pub fn new_session(&self, agent_id: AgentId, org_id: Option<OrgId>, parent_session_id: Option<SessionId>) -> Session {
        let id = SessionId::new();
        let session = Session {
            id,
            agent_id,
            org_id,
            status: SessionStatus::Pending,
            created_at: chrono::Utc::now(),
            message_log_ref: format!("session:{id}"),
            parent_session_id,
        };
        self.sessions.insert(id, session.clone());
        self.messages.insert(id, Vec::new());
        session
    }

    /// Append a turn to a session's message log.
    pub fn log_message(&self, session_id: SessionId, role: &str, content: &str) {
        self.messages
            .entry(session_id)
            .or_default()
            .push(ChatMessage {
                role: role.to_string(),
                content: content.to_string(),
                at: chrono::Utc::now(),
            });
    }

    /// Update a session's status in place. No-op if the session is gone.
    pub fn set_status(&self, session_id: SessionId, status: SessionStatus) {
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.status = status;
        }
    }

    /// Count of sessions currently in `running` or `pending`.
    pub fn live_session_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| matches!(entry.value().status, SessionStatus::Running | SessionStatus::Pending))
            .count()
    }
}
