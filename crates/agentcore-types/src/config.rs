//! Agent configuration: a closed algebraic shape instead of an open bag.
//!
//! Per the design notes, the source's dynamic configuration object is
//! rendered here as a fully-typed record with three nested groups
//! (`identity`, `model`, `deployment`) that the lifecycle manager deep-merges
//! on update, plus a shallow-overlaid remainder.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full configuration for a managed agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Internal machine name, unique within an organization.
    pub name: Option<String>,
    /// Human-facing display name.
    pub display_name: Option<String>,
    /// Identity / persona configuration.
    pub identity: IdentityConfig,
    /// Model reference used to generate replies.
    pub model: ModelRef,
    /// Deployment target descriptor.
    pub deployment: DeploymentDescriptor,
    /// Which communication channels are enabled.
    pub channels: ChannelsConfig,
    /// Workspace (filesystem / sandbox) policy.
    pub workspace: WorkspacePolicy,
    /// Heartbeat / health-check policy overrides.
    pub heartbeat: HeartbeatPolicy,
    /// Id of the permission profile governing tool calls.
    pub permission_profile_id: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: None,
            display_name: None,
            identity: IdentityConfig::default(),
            model: ModelRef::default(),
            deployment: DeploymentDescriptor::default(),
            channels: ChannelsConfig::default(),
            workspace: WorkspacePolicy::default(),
            heartbeat: HeartbeatPolicy::default(),
            permission_profile_id: None,
        }
    }
}

impl AgentConfig {
    /// Completeness predicate: name, display name, identity.role, model id,
    /// deployment target, and permission profile must all be present.
    pub fn is_complete(&self) -> bool {
        self.name.as_ref().is_some_and(|s| !s.trim().is_empty())
            && self
                .display_name
                .as_ref()
                .is_some_and(|s| !s.trim().is_empty())
            && self.identity.role.as_ref().is_some_and(|s| !s.trim().is_empty())
            && self.model.model_id.as_ref().is_some_and(|s| !s.trim().is_empty())
            && self.deployment.target.is_some()
            && self
                .permission_profile_id
                .as_ref()
                .is_some_and(|s| !s.trim().is_empty())
    }

    /// Deep-merge `identity`, `model`, and `deployment` from `patch`;
    /// shallow-overlay everything else (top-level scalar fields and the
    /// remaining nested groups, which have no sub-merge semantics).
    pub fn merged_with(&self, patch: &ConfigPatch) -> AgentConfig {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = Some(name.clone());
        }
        if let Some(display_name) = &patch.display_name {
            next.display_name = Some(display_name.clone());
        }
        if let Some(identity) = &patch.identity {
            next.identity = next.identity.merged_with(identity);
        }
        if let Some(model) = &patch.model {
            next.model = next.model.merged_with(model);
        }
        if let Some(deployment) = &patch.deployment {
            next.deployment = next.deployment.merged_with(deployment);
        }
        if let Some(channels) = &patch.channels {
            next.channels = channels.clone();
        }
        if let Some(workspace) = &patch.workspace {
            next.workspace = workspace.clone();
        }
        if let Some(heartbeat) = &patch.heartbeat {
            next.heartbeat = heartbeat.clone();
        }
        if let Some(permission_profile_id) = &patch.permission_profile_id {
            next.permission_profile_id = Some(permission_profile_id.clone());
        }
        next
    }
}

/// A partial update to an `AgentConfig`. Every field is optional; absent
/// fields are left untouched by `AgentConfig::merged_with`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    /// New machine name, if changing.
    pub name: Option<String>,
    /// New display name, if changing.
    pub display_name: Option<String>,
    /// Partial identity update, deep-merged.
    pub identity: Option<IdentityPatch>,
    /// Partial model update, deep-merged.
    pub model: Option<ModelPatch>,
    /// Partial deployment update, deep-merged.
    pub deployment: Option<DeploymentPatch>,
    /// Full replacement of channel toggles, if present.
    pub channels: Option<ChannelsConfig>,
    /// Full replacement of workspace policy, if present.
    pub workspace: Option<WorkspacePolicy>,
    /// Full replacement of heartbeat policy, if present.
    pub heartbeat: Option<HeartbeatPolicy>,
    /// New permission profile id, if changing.
    pub permission_profile_id: Option<String>,
}

/// Agent persona / identity configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Functional role, e.g. "customer support agent".
    pub role: Option<String>,
    /// Conversational tone, e.g. "formal", "warm".
    pub tone: Option<String>,
    /// Preferred response language (BCP-47 tag).
    pub language: Option<String>,
    /// Optional date of birth, used by the birthday scheduler to find
    /// today's matches and to compute age.
    pub date_of_birth: Option<NaiveDate>,
}

impl IdentityConfig {
    fn merged_with(&self, patch: &IdentityPatch) -> IdentityConfig {
        IdentityConfig {
            role: patch.role.clone().or_else(|| self.role.clone()),
            tone: patch.tone.clone().or_else(|| self.tone.clone()),
            language: patch.language.clone().or_else(|| self.language.clone()),
            date_of_birth: patch.date_of_birth.or(self.date_of_birth),
        }
    }
}

/// Partial identity update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityPatch {
    /// Replacement role, if present.
    pub role: Option<String>,
    /// Replacement tone, if present.
    pub tone: Option<String>,
    /// Replacement language, if present.
    pub language: Option<String>,
    /// Replacement date of birth, if present.
    pub date_of_birth: Option<NaiveDate>,
}

/// Reasoning effort requested from the model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingLevel {
    /// No extended reasoning.
    Off,
    /// Light extended reasoning.
    Low,
    /// Default extended reasoning.
    Medium,
    /// Heavy extended reasoning.
    High,
}

impl Default for ThinkingLevel {
    fn default() -> Self {
        ThinkingLevel::Medium
    }
}

/// Reference to the model an agent uses to generate replies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    /// Model provider name, e.g. "anthropic".
    pub provider: Option<String>,
    /// Provider-specific model id.
    pub model_id: Option<String>,
    /// Requested thinking/reasoning level.
    pub thinking_level: ThinkingLevel,
}

impl ModelRef {
    fn merged_with(&self, patch: &ModelPatch) -> ModelRef {
        ModelRef {
            provider: patch.provider.clone().or_else(|| self.provider.clone()),
            model_id: patch.model_id.clone().or_else(|| self.model_id.clone()),
            thinking_level: patch.thinking_level.unwrap_or(self.thinking_level),
        }
    }
}

/// Partial model update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPatch {
    /// Replacement provider, if present.
    pub provider: Option<String>,
    /// Replacement model id, if present.
    pub model_id: Option<String>,
    /// Replacement thinking level, if present.
    pub thinking_level: Option<ThinkingLevel>,
}

/// The kind of infrastructure an agent runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentTarget {
    /// Container engine (e.g. a local or orchestrated container runtime).
    Container,
    /// A remote host reached via shell-over-network.
    RemoteShell,
    /// First managed cloud platform adapter.
    ManagedPlatformA,
    /// Second managed cloud platform adapter.
    ManagedPlatformB,
}

impl DeploymentTarget {
    /// Stable key used by the deployer registry to look up an adapter.
    pub fn registry_key(&self) -> &'static str {
        match self {
            DeploymentTarget::Container => "container",
            DeploymentTarget::RemoteShell => "remote_shell",
            DeploymentTarget::ManagedPlatformA => "managed_platform_a",
            DeploymentTarget::ManagedPlatformB => "managed_platform_b",
        }
    }
}

/// Deployment target plus target-specific parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    /// Which target kind to deploy to.
    pub target: Option<DeploymentTarget>,
    /// Free-form target-specific parameters (image tag, host, region, ...).
    pub params: BTreeMap<String, String>,
}

impl DeploymentDescriptor {
    fn merged_with(&self, patch: &DeploymentPatch) -> DeploymentDescriptor {
        let mut params = self.params.clone();
        for (k, v) in &patch.params {
            params.insert(k.clone(), v.clone());
        }
        DeploymentDescriptor {
            target: patch.target.or(self.target),
            params,
        }
    }
}

/// Partial deployment update. `params` entries are merged key-by-key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPatch {
    /// Replacement target, if present.
    pub target: Option<DeploymentTarget>,
    /// Parameter overrides, merged into the existing map.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Which communication channels an agent is reachable on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Inbound/outbound chat channel enabled.
    pub chat_enabled: bool,
    /// Inbound/outbound email channel enabled.
    pub email_enabled: bool,
}

/// Filesystem / sandbox policy for an agent's workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspacePolicy {
    /// Root path the agent is confined to.
    pub root_path: Option<String>,
    /// Whether the workspace is mounted read-only.
    pub read_only: bool,
}

/// Health-check loop cadence and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPolicy {
    /// Interval, in seconds, between health-check ticks.
    pub interval_secs: u64,
    /// Timeout, in seconds, to wait for the first healthy report after deploy.
    pub deploy_healthy_timeout_secs: u64,
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            deploy_healthy_timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_config_is_not_complete() {
        let config = AgentConfig::default();
        assert!(!config.is_complete());
    }

    #[test]
    fn complete_config_satisfies_predicate() {
        let config = AgentConfig {
            name: Some("billing-bot".into()),
            display_name: Some("Billing Bot".into()),
            identity: IdentityConfig {
                role: Some("billing assistant".into()),
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
        assert!(config.is_complete());
    }

    #[test]
    fn merge_only_touches_named_groups() {
        let base = AgentConfig {
            identity: IdentityConfig {
                role: Some("support".into()),
                tone: Some("neutral".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let patch = ConfigPatch {
            identity: Some(IdentityPatch {
                tone: Some("warm".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = base.merged_with(&patch);
        assert_eq!(merged.identity.role.as_deref(), Some("support"));
        assert_eq!(merged.identity.tone.as_deref(), Some("warm"));
    }

    #[test]
    fn deployment_params_merge_key_by_key() {
        let mut base = AgentConfig::default();
        base.deployment.params.insert("region".into(), "us-east".into());
        let mut patch = ConfigPatch::default();
        let mut dp = DeploymentPatch::default();
        dp.params.insert("image".into(), "agent:v2".into());
        patch.deployment = Some(dp);
        let merged = base.merged_with(&patch);
        assert_eq!(merged.deployment.params.get("region").unwrap(), "us-east");
        assert_eq!(merged.deployment.params.get("image").unwrap(), "agent:v2");
    }
}
