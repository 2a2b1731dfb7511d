//! `/api/engine/*` — the part of the administrative HTTP surface that is
//! "part of core" per the external-interfaces design: agent CRUD and a
//! permission-check probe, both thin wrappers over the lifecycle manager
//! and permission resolver already built into the other crates. Journal,
//! messages, tasks, guardrails, and compliance-report sub-paths have no
//! backing subsystem in this workspace and are not mounted.

use crate::profiles::ProfileIndex;
use agentcore_gateway::ApiError;
use agentcore_lifecycle::LifecycleManager;
use agentcore_permissions::PermissionResolver;
use agentcore_types::{AgentConfig, AgentId, ConfigPatch, ManagedAgent, OrgId};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state behind the engine routes.
#[derive(Clone)]
pub struct EngineState {
    lifecycle: Arc<LifecycleManager>,
    permissions: Arc<PermissionResolver>,
    profile_index: ProfileIndex,
}

impl EngineState {
    /// Construct engine state wired to the process-wide lifecycle manager,
    /// permission resolver, and agent/profile index.
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        permissions: Arc<PermissionResolver>,
        profile_index: ProfileIndex,
    ) -> Self {
        Self {
            lifecycle,
            permissions,
            profile_index,
        }
    }
}

/// Build the `/api/engine`-prefixed router.
pub fn router(state: EngineState) -> Router {
    Router::new()
        .route("/api/engine/agents", post(create_agent).get(list_agents))
        .route(
            "/api/engine/agents/:id",
            get(get_agent).patch(update_agent).delete(delete_agent),
        )
        .route("/api/engine/permissions/check", post(check_permission))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateAgentRequest {
    org_id: OrgId,
    config: AgentConfig,
}

async fn create_agent(
    State(state): State<EngineState>,
    Json(body): Json<CreateAgentRequest>,
) -> Result<(axum::http::StatusCode, Json<ManagedAgent>), ApiError> {
    let profile_id = body.config.permission_profile_id.clone();
    let agent = state.lifecycle.create_agent(body.org_id, body.config).await?;
    state.profile_index.set(agent.id, profile_id.as_deref());
    Ok((axum::http::StatusCode::CREATED, Json(agent)))
}

#[derive(Debug, Deserialize)]
struct ListAgentsQuery {
    limit: Option<usize>,
}

async fn list_agents(
    State(state): State<EngineState>,
    Query(query): Query<ListAgentsQuery>,
) -> Result<Json<Vec<ManagedAgent>>, ApiError> {
    let mut agents = Vec::new();
    for id in state.lifecycle.agent_ids() {
        if let Ok(agent) = state.lifecycle.get_agent(id).await {
            agents.push(agent);
        }
    }
    agents.sort_by_key(|agent| agent.created_at);
    if let Some(limit) = query.limit {
        agents.truncate(limit);
    }
    Ok(Json(agents))
}

async fn get_agent(State(state): State<EngineState>, Path(id): Path<AgentId>) -> Result<Json<ManagedAgent>, ApiError> {
    Ok(Json(state.lifecycle.get_agent(id).await?))
}

async fn update_agent(
    State(state): State<EngineState>,
    Path(id): Path<AgentId>,
    Json(patch): Json<ConfigPatch>,
) -> Result<Json<ManagedAgent>, ApiError> {
    let profile_id = patch.permission_profile_id.clone();
    let agent = state.lifecycle.update_config(id, patch).await?;
    if profile_id.is_some() {
        state.profile_index.set(id, profile_id.as_deref());
    }
    Ok(Json(agent))
}

async fn delete_agent(State(state): State<EngineState>, Path(id): Path<AgentId>) -> Result<axum::http::StatusCode, ApiError> {
    state.lifecycle.destroy(id).await?;
    state.profile_index.remove(id);
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CheckPermissionRequest {
    agent_id: AgentId,
    tool_id: String,
}

#[derive(Debug, Serialize)]
struct CheckPermissionResponse {
    allowed: bool,
    policy: String,
    reason: String,
}

async fn check_permission(
    State(state): State<EngineState>,
    Json(body): Json<CheckPermissionRequest>,
) -> Json<CheckPermissionResponse> {
    let decision = state.permissions.check(body.agent_id, &body.tool_id);
    Json(CheckPermissionResponse {
        allowed: decision.allowed,
        policy: format!("{:?}", decision.policy),
        reason: decision.reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_budget::BudgetEnforcer;
    use agentcore_bus::EventBus;
    use agentcore_deploy::adapters::ContainerTarget;
    use agentcore_deploy::DeployerRegistry;
    use agentcore_permissions::{PermissionProfile, ToolPolicy};
    use agentcore_store_memory::MemoryBackend;
    use std::collections::{HashMap, HashSet};

    async fn wired_state() -> EngineState {
        let bus = EventBus::new();
        let deployers = DeployerRegistry::new();
        deployers.register("container", Arc::new(ContainerTarget::default()));
        let budget = Arc::new(BudgetEnforcer::new());
        let lifecycle = LifecycleManager::new(bus, deployers, budget, None);
        lifecycle
            .set_persistence(Arc::new(MemoryBackend::new()))
            .await
            .expect("persistence wiring");

        let profile_index = ProfileIndex::new();
        let permissions = Arc::new(PermissionResolver::new(Arc::new(profile_index.clone())));
        permissions.reload_profile(PermissionProfile {
            id: "default".into(),
            tool_policies: HashMap::from([("spawn_sub_agent".into(), ToolPolicy::Auto)]),
            external_tools: HashSet::new(),
        });
        EngineState::new(lifecycle, permissions, profile_index)
    }

    fn complete_config() -> AgentConfig {
        let mut config = AgentConfig {
            name: Some("demo".into()),
            display_name: Some("Demo Agent".into()),
            permission_profile_id: Some("default".into()),
            ..Default::default()
        };
        config.identity.role = Some("assistant".into());
        config.model.model_id = Some("gpt-test".into());
        config.deployment.target = Some(agentcore_types::DeploymentTarget::Container);
        config
    }

    #[tokio::test]
    async fn create_then_get_agent_round_trips() {
        let state = wired_state().await;
        let (status, Json(created)) = create_agent(
            State(state.clone()),
            Json(CreateAgentRequest {
                org_id: OrgId::new(),
                config: complete_config(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, axum::http::StatusCode::CREATED);

        let Json(fetched) = get_agent(State(state), Path(created.id)).await.unwrap();
        assert_eq!(fetched.id, created.id);
    }

    #[tokio::test]
    async fn delete_agent_removes_profile_index_entry() {
        let state = wired_state().await;
        let (_, Json(created)) = create_agent(
            State(state.clone()),
            Json(CreateAgentRequest {
                org_id: OrgId::new(),
                config: complete_config(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(state.profile_index.profile_id_for(created.id), Some("default".to_string()));

        delete_agent(State(state.clone()), Path(created.id)).await.unwrap();
        assert_eq!(state.profile_index.profile_id_for(created.id), None);
    }

    #[tokio::test]
    async fn check_permission_allows_registered_tool() {
        let state = wired_state().await;
        let (_, Json(created)) = create_agent(
            State(state.clone()),
            Json(CreateAgentRequest {
                org_id: OrgId::new(),
                config: complete_config(),
            }),
        )
        .await
        .unwrap();

        let Json(response) = check_permission(
            State(state),
            Json(CheckPermissionRequest {
                agent_id: created.id,
                tool_id: "spawn_sub_agent".into(),
            }),
        )
        .await;
        assert!(response.allowed);
    }
}
