//! Handlers for the `/runtime` HTTP surface. Every write endpoint validates
//! required fields up front (400 on violation); a missing agent or session
//! surfaces as 404 via `ApiError::from(CoreError::NotFound)`.

use crate::error::ApiError;
use crate::events::SessionEvent;
use crate::state::{ChatMessage, GatewayState};
use agentcore_budget::ToolCallUsage;
use agentcore_llm::GenerateReplyRequest;
use agentcore_types::{AgentId, OrgId, Session, SessionId, SessionStatus};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Wire view of a `Session`, field names matching the documented HTTP
/// contract rather than this crate's internal `snake_case` convention.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    session_id: SessionId,
    agent_id: AgentId,
    org_id: Option<OrgId>,
    status: SessionStatus,
    created_at: chrono::DateTime<chrono::Utc>,
    parent_session_id: Option<SessionId>,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            agent_id: session.agent_id,
            org_id: session.org_id,
            status: session.status,
            created_at: session.created_at,
            parent_session_id: session.parent_session_id,
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::BadRequest(format!("'{field}' must not be empty")))
    } else {
        Ok(())
    }
}

fn session_or_404(state: &GatewayState, id: SessionId) -> Result<Session, ApiError> {
    state
        .sessions
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))
}

/// Run the configured `generate-reply` hook (or echo the inbound message if
/// none is configured), log the assistant turn, report usage to the budget
/// enforcer, and fan the turn out over the session's event stream.
async fn reply_and_log(
    state: &Arc<GatewayState>,
    agent_id: AgentId,
    session_id: SessionId,
    message: &str,
    system_prompt: Option<String>,
) {
    let content = match &state.llm {
        Some(llm) => {
            let request = GenerateReplyRequest {
                agent_id,
                system_prompt,
                message: message.to_string(),
            };
            match llm.generate_reply(request).await {
                Ok(response) => {
                    let _ = state
                        .lifecycle
                        .record_tool_call(
                            agent_id,
                            ToolCallUsage {
                                tool_id: "generate_reply".into(),
                                tokens_used: Some(response.usage.tokens_used),
                                cost_usd: Some(response.usage.cost_usd),
                                is_external_action: false,
                                error: false,
                            },
                        )
                        .await;
                    response.content
                }
                Err(err) => {
                    state.hub.emit(
                        session_id,
                        SessionEvent::new("error", json!({ "message": err })),
                    );
                    return;
                }
            }
        }
        None => message.to_string(),
    };
    state.log_message(session_id, "agent", &content);
    state.hub.emit(
        session_id,
        SessionEvent::new("message", json!({ "role": "agent", "content": content })),
    );
}

/// `POST /runtime/sessions` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    agent_id: AgentId,
    org_id: Option<OrgId>,
    message: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
}

/// `POST /runtime/sessions` — spawn a session against an existing agent.
pub async fn create_session(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let _ = req.model;
    require_non_empty("message", &req.message)?;
    state.lifecycle.get_agent(req.agent_id).await?;

    let session = state.new_session(req.agent_id, req.org_id, None);
    state.set_status(session.id, SessionStatus::Running);
    state.log_message(session.id, "user", &req.message);
    state.hub.emit(
        session.id,
        SessionEvent::new("message", json!({ "role": "user", "content": req.message })),
    );
    reply_and_log(&state, req.agent_id, session.id, &req.message, req.system_prompt).await;

    let view = session_or_404(&state, session.id)?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// Query parameters accepted by `GET /runtime/sessions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    agent_id: Option<AgentId>,
    status: Option<SessionStatus>,
    limit: Option<usize>,
}

/// `GET /runtime/sessions` — list sessions, optionally filtered.
pub async fn list_sessions(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ListSessionsQuery>,
) -> Json<Vec<SessionView>> {
    let mut sessions: Vec<Session> = state
        .sessions
        .iter()
        .map(|entry| entry.value().clone())
        .filter(|session| query.agent_id.map_or(true, |id| id == session.agent_id))
        .filter(|session| query.status.map_or(true, |status| status == session.status))
        .collect();
    sessions.sort_by_key(|session| session.created_at);
    if let Some(limit) = query.limit {
        sessions.truncate(limit);
    }
    Json(sessions.into_iter().map(SessionView::from).collect())
}

/// `GET /runtime/sessions/:id` — retrieve a single session.
pub async fn get_session(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(session_or_404(&state, id)?.into()))
}

/// `DELETE /runtime/sessions/:id` — terminate a session and close its
/// stream.
pub async fn terminate_session(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionView>, ApiError> {
    session_or_404(&state, id)?;
    state.set_status(id, SessionStatus::Terminated);
    state
        .hub
        .emit(id, SessionEvent::new("session_end", json!({ "reason": "terminated" })));
    Ok(Json(session_or_404(&state, id)?.into()))
}

/// `POST /runtime/sessions/:id/message` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    message: String,
    #[serde(default)]
    system_prompt: Option<String>,
}

/// `POST /runtime/sessions/:id/message` — send a message to an active
/// session.
pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<SessionId>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ChatMessage>, ApiError> {
    require_non_empty("message", &req.message)?;
    let session = session_or_404(&state, id)?;
    if matches!(session.status, SessionStatus::Terminated | SessionStatus::Error) {
        return Err(ApiError::Conflict(format!(
            "session {id} is {:?} and no longer accepts messages",
            session.status
        )));
    }
    state.log_message(id, "user", &req.message);
    state.hub.emit(
        id,
        SessionEvent::new("message", json!({ "role": "user", "content": req.message })),
    );
    reply_and_log(&state, session.agent_id, id, &req.message, req.system_prompt).await;

    let reply = state
        .messages
        .get(&id)
        .and_then(|log| log.value().last().cloned())
        .ok_or_else(|| ApiError::Internal("no reply recorded".into()))?;
    Ok(Json(reply))
}

/// `GET /runtime/sessions/:id/messages` — the session's message log.
pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<SessionId>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    session_or_404(&state, id)?;
    Ok(Json(
        state.messages.get(&id).map(|log| log.value().clone()).unwrap_or_default(),
    ))
}

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// `GET /runtime/sessions/:id/stream` — subscribe to a session's events
/// over server-sent events. Closes and deregisters on `session_end` or
/// `error`.
pub async fn stream_session(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<SessionId>,
) -> Result<Sse<EventStream>, ApiError> {
    session_or_404(&state, id)?;
    let receiver = state.hub.subscribe(id);

    let keep_alive = stream::once(async { Ok(Event::default().comment("stream open")) });
    let events = stream::unfold(Some(receiver), |receiver_slot| async move {
        let mut receiver = receiver_slot?;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let terminal = matches!(event.kind.as_str(), "session_end" | "error");
                    let sse_event = Event::default()
                        .json_data(&event)
                        .unwrap_or_else(|_| Event::default().data("{}"));
                    let next = if terminal { None } else { Some(receiver) };
                    return Some((Ok(sse_event), next));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    let stream: EventStream = Box::pin(keep_alive.chain(events));
    Ok(Sse::new(stream))
}

/// `POST /runtime/spawn` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnSubAgentRequest {
    parent_session_id: SessionId,
    task: String,
    #[serde(default)]
    agent_id: Option<AgentId>,
    #[serde(default)]
    model: Option<String>,
}

/// `POST /runtime/spawn` — create a sub-agent session under a parent
/// session.
pub async fn spawn_sub_agent(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<SpawnSubAgentRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let _ = req.model;
    require_non_empty("task", &req.task)?;
    let parent = session_or_404(&state, req.parent_session_id)?;
    let agent_id = req.agent_id.unwrap_or(parent.agent_id);
    state.lifecycle.get_agent(agent_id).await?;
    let decision = state.permissions.check(parent.agent_id, "spawn_sub_agent");
    if !decision.allowed {
        return Err(ApiError::Conflict(decision.reason));
    }

    let session = state.new_session(agent_id, parent.org_id, Some(req.parent_session_id));
    state.set_status(session.id, SessionStatus::Running);
    state.log_message(session.id, "system", &req.task);
    state.hub.emit(
        req.parent_session_id,
        SessionEvent::new(
            "sub_agent_spawned",
            json!({ "sessionId": session.id, "agentId": agent_id }),
        ),
    );
    reply_and_log(&state, agent_id, session.id, &req.task, None).await;

    let view = session_or_404(&state, session.id)?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// `POST /runtime/hooks/inbound` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundHookRequest {
    agent_id: AgentId,
    #[serde(default)]
    org_id: Option<OrgId>,
    #[serde(default)]
    session_id: Option<SessionId>,
    message: String,
}

/// `POST /runtime/hooks/inbound` — fan an external event in, creating a
/// session if none is named.
pub async fn inbound_hook(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<InboundHookRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    require_non_empty("message", &req.message)?;
    state.lifecycle.get_agent(req.agent_id).await?;

    let (session, status) = match req.session_id {
        Some(id) => (session_or_404(&state, id)?, StatusCode::OK),
        None => {
            let session = state.new_session(req.agent_id, req.org_id, None);
            state.set_status(session.id, SessionStatus::Running);
            (session, StatusCode::CREATED)
        }
    };
    state.log_message(session.id, "user", &req.message);
    state.hub.emit(
        session.id,
        SessionEvent::new("message", json!({ "role": "user", "content": req.message })),
    );
    reply_and_log(&state, req.agent_id, session.id, &req.message, None).await;

    let view = session_or_404(&state, session.id)?;
    Ok((status, Json(view.into())))
}

/// `GET /runtime/health` — overall status and the live session count.
pub async fn health(State(state): State<Arc<GatewayState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "liveSessions": state.live_session_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_budget::BudgetEnforcer;
    use agentcore_bus::EventBus;
    use agentcore_deploy::adapters::ContainerTarget;
    use agentcore_deploy::DeployerRegistry;
    use agentcore_lifecycle::LifecycleManager;
    use agentcore_permissions::{AgentProfileLookup, PermissionProfile, PermissionResolver, ToolPolicy};
    use agentcore_store_memory::MemoryBackend;
    use agentcore_types::{AgentConfig, DeploymentDescriptor, DeploymentTarget, IdentityConfig, ModelRef, OrgId};
    use std::collections::HashMap;

    struct AllowAllLookup;
    impl AgentProfileLookup for AllowAllLookup {
        fn profile_id_for(&self, _agent_id: AgentId) -> Option<String> {
            Some("default".into())
        }
    }

    fn permissions() -> Arc<PermissionResolver> {
        let resolver = PermissionResolver::new(Arc::new(AllowAllLookup));
        let mut tool_policies = HashMap::new();
        tool_policies.insert("spawn_sub_agent".into(), ToolPolicy::Auto);
        resolver.reload_profile(PermissionProfile {
            id: "default".into(),
            tool_policies,
            external_tools: Default::default(),
        });
        Arc::new(resolver)
    }

    async fn wired_state() -> (Arc<GatewayState>, AgentId) {
        let registry = DeployerRegistry::new();
        registry.register("container", Arc::new(ContainerTarget::default()));
        let lifecycle = LifecycleManager::new(EventBus::new(), registry, Arc::new(BudgetEnforcer::new()), None);
        lifecycle.set_persistence(Arc::new(MemoryBackend::new())).await.unwrap();
        let config = AgentConfig {
            name: Some("support-bot".into()),
            display_name: Some("Support Bot".into()),
            identity: IdentityConfig {
                role: Some("support assistant".into()),
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
            ..Default::default()
        };
        let agent = lifecycle.create_agent(OrgId::new(), config).await.unwrap();
        let state = GatewayState::new(lifecycle, permissions(), None);
        (state, agent.id)
    }

    #[tokio::test]
    async fn create_session_against_unknown_agent_is_not_found() {
        let (state, _agent_id) = wired_state().await;
        let result = create_session(
            State(state),
            Json(CreateSessionRequest {
                agent_id: AgentId::new(),
                org_id: None,
                message: "hi".into(),
                model: None,
                system_prompt: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_session_echoes_message_when_no_llm_configured() {
        let (state, agent_id) = wired_state().await;
        let (status, Json(view)) = create_session(
            State(state.clone()),
            Json(CreateSessionRequest {
                agent_id,
                org_id: None,
                message: "hello there".into(),
                model: None,
                system_prompt: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(view.status, SessionStatus::Running);

        let Json(messages) = list_messages(State(state), Path(view.session_id)).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "agent");
        assert_eq!(messages[1].content, "hello there");
    }

    #[tokio::test]
    async fn send_message_rejects_empty_body() {
        let (state, agent_id) = wired_state().await;
        let (_, Json(view)) = create_session(
            State(state.clone()),
            Json(CreateSessionRequest {
                agent_id,
                org_id: None,
                message: "hi".into(),
                model: None,
                system_prompt: None,
            }),
        )
        .await
        .unwrap();
        let result = send_message(
            State(state),
            Path(view.session_id),
            Json(SendMessageRequest {
                message: "   ".into(),
                system_prompt: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn terminate_session_then_send_message_is_conflict() {
        let (state, agent_id) = wired_state().await;
        let (_, Json(view)) = create_session(
            State(state.clone()),
            Json(CreateSessionRequest {
                agent_id,
                org_id: None,
                message: "hi".into(),
                model: None,
                system_prompt: None,
            }),
        )
        .await
        .unwrap();
        terminate_session(State(state.clone()), Path(view.session_id)).await.unwrap();
        let result = send_message(
            State(state),
            Path(view.session_id),
            Json(SendMessageRequest {
                message: "still here?".into(),
                system_prompt: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn spawn_sub_agent_creates_child_session_with_parent_link() {
        let (state, agent_id) = wired_state().await;
        let (_, Json(parent)) = create_session(
            State(state.clone()),
            Json(CreateSessionRequest {
                agent_id,
                org_id: None,
                message: "kick off the refund flow".into(),
                model: None,
                system_prompt: None,
            }),
        )
        .await
        .unwrap();

        let (status, Json(child)) = spawn_sub_agent(
            State(state),
            Json(SpawnSubAgentRequest {
                parent_session_id: parent.session_id,
                task: "look up the order".into(),
                agent_id: None,
                model: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(child.parent_session_id, Some(parent.session_id));
        assert_eq!(child.agent_id, agent_id);
    }

    #[tokio::test]
    async fn health_reports_live_session_count() {
        let (state, agent_id) = wired_state().await;
        create_session(
            State(state.clone()),
            Json(CreateSessionRequest {
                agent_id,
                org_id: None,
                message: "hi".into(),
                model: None,
                system_prompt: None,
            }),
        )
        .await
        .unwrap();
        let Json(body) = health(State(state)).await;
        assert_eq!(body["liveSessions"], 1);
    }
}
