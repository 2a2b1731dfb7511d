#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **agentcore-permissions** – Skill & permission resolver for the Agent
//! Lifecycle & Runtime Core.
//!
//! Validates tool-call policy for each agent at runtime. Profiles are
//! cached in memory (a `DashMap` keyed by profile id, mirroring
//! `toka-orchestration`'s concurrent-map usage) and reloaded on change via
//! `PermissionResolver::reload_profile`, generalizing
//! `toka-capability-core::TokenValidator`'s validate-by-claims shape to a
//! validate-by-declared-profile shape.

use agentcore_types::AgentId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// How a tool call under a given profile should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPolicy {
    /// Admit the call without further confirmation.
    Auto,
    /// Admit the call but require a human approval step before execution.
    RequireApproval,
    /// Reject the call outright.
    Deny,
}

/// Side-effect classification of a tool, used by callers to decide how
/// aggressively to log or gate a call beyond the bare policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectClass {
    /// No observable side effects outside the conversation.
    ReadOnly,
    /// Mutates agent-owned state only.
    Internal,
    /// Has externally visible side effects (sends email, moves money, ...).
    External,
}

/// A named bundle of tool-call permissions referenced by agents via
/// `AgentConfig::permission_profile_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionProfile {
    /// Stable profile id.
    pub id: String,
    /// Per-tool policy. Tools absent from this map are denied by default.
    pub tool_policies: HashMap<String, ToolPolicy>,
    /// Tools classified as having external side effects.
    pub external_tools: HashSet<String>,
}

impl PermissionProfile {
    /// Policy in effect for `tool_id`, defaulting to `Deny` if unlisted.
    pub fn policy_for(&self, tool_id: &str) -> ToolPolicy {
        self.tool_policies
            .get(tool_id)
            .copied()
            .unwrap_or(ToolPolicy::Deny)
    }

    /// Side-effect classification for `tool_id`.
    pub fn side_effect_class(&self, tool_id: &str) -> SideEffectClass {
        if self.external_tools.contains(tool_id) {
            SideEffectClass::External
        } else {
            SideEffectClass::Internal
        }
    }
}

/// Outcome of a permission check, with an explanatory reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDecision {
    /// Whether the call is admitted outright (approval may still be needed
    /// upstream — see `policy`).
    pub allowed: bool,
    /// The raw policy that produced this decision.
    pub policy: ToolPolicy,
    /// Human-readable explanation.
    pub reason: String,
}

/// Looks up an agent's declared profile id. Kept as a trait so the
/// resolver does not need to depend on the lifecycle manager directly.
pub trait AgentProfileLookup: Send + Sync {
    /// Return the permission profile id declared by `agent_id`, if any.
    fn profile_id_for(&self, agent_id: AgentId) -> Option<String>;
}

/// Resolves tool-call permissions for agents, with an in-memory cache of
/// loaded profiles.
#[derive(Clone)]
pub struct PermissionResolver {
    profiles: Arc<DashMap<String, PermissionProfile>>,
    lookup: Arc<dyn AgentProfileLookup>,
}

impl PermissionResolver {
    /// Construct a resolver backed by `lookup` for agent -> profile id
    /// resolution. The profile cache starts empty; load profiles with
    /// `reload_profile` before the first `check` call.
    pub fn new(lookup: Arc<dyn AgentProfileLookup>) -> Self {
        Self {
            profiles: Arc::new(DashMap::new()),
            lookup,
        }
    }

    /// Insert or replace a cached profile.
    pub fn reload_profile(&self, profile: PermissionProfile) {
        debug!(profile_id = %profile.id, "reloading permission profile");
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Remove a profile from the cache.
    pub fn evict_profile(&self, profile_id: &str) {
        self.profiles.remove(profile_id);
    }

    /// Decide whether `agent_id` may call `tool_id`.
    pub fn check(&self, agent_id: AgentId, tool_id: &str) -> PermissionDecision {
        let Some(profile_id) = self.lookup.profile_id_for(agent_id) else {
            return PermissionDecision {
                allowed: false,
                policy: ToolPolicy::Deny,
                reason: "agent has no permission profile configured".into(),
            };
        };
        let Some(profile) = self.profiles.get(&profile_id) else {
            return PermissionDecision {
                allowed: false,
                policy: ToolPolicy::Deny,
                reason: format!("permission profile '{profile_id}' is not loaded"),
            };
        };
        let policy = profile.policy_for(tool_id);
        match policy {
            ToolPolicy::Auto => PermissionDecision {
                allowed: true,
                policy,
                reason: format!("tool '{tool_id}' is auto-approved under '{profile_id}'"),
            },
            ToolPolicy::RequireApproval => PermissionDecision {
                allowed: false,
                policy,
                reason: format!("tool '{tool_id}' requires human approval under '{profile_id}'"),
            },
            ToolPolicy::Deny => PermissionDecision {
                allowed: false,
                policy,
                reason: format!("tool '{tool_id}' is denied under '{profile_id}'"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticLookup(HashMap<AgentId, String>);
    impl AgentProfileLookup for StaticLookup {
        fn profile_id_for(&self, agent_id: AgentId) -> Option<String> {
            self.0.get(&agent_id).cloned()
        }
    }

    fn profile() -> PermissionProfile {
        let mut tool_policies = HashMap::new();
        tool_policies.insert("send_email".into(), ToolPolicy::RequireApproval);
        tool_policies.insert("search_docs".into(), ToolPolicy::Auto);
        let mut external_tools = HashSet::new();
        external_tools.insert("send_email".into());
        PermissionProfile {
            id: "default".into(),
            tool_policies,
            external_tools,
        }
    }

    #[test]
    fn auto_policy_is_allowed() {
        let agent_id = AgentId::new();
        let mut map = HashMap::new();
        map.insert(agent_id, "default".into());
        let resolver = PermissionResolver::new(Arc::new(StaticLookup(map)));
        resolver.reload_profile(profile());
        let decision = resolver.check(agent_id, "search_docs");
        assert!(decision.allowed);
    }

    #[test]
    fn require_approval_is_not_allowed_outright() {
        let agent_id = AgentId::new();
        let mut map = HashMap::new();
        map.insert(agent_id, "default".into());
        let resolver = PermissionResolver::new(Arc::new(StaticLookup(map)));
        resolver.reload_profile(profile());
        let decision = resolver.check(agent_id, "send_email");
        assert!(!decision.allowed);
        assert_eq!(decision.policy, ToolPolicy::RequireApproval);
    }

    #[test]
    fn unlisted_tool_defaults_to_deny() {
        let agent_id = AgentId::new();
        let mut map = HashMap::new();
        map.insert(agent_id, "default".into());
        let resolver = PermissionResolver::new(Arc::new(StaticLookup(map)));
        resolver.reload_profile(profile());
        let decision = resolver.check(agent_id, "delete_database");
        assert!(!decision.allowed);
        assert_eq!(decision.policy, ToolPolicy::Deny);
    }

    #[test]
    fn agent_without_profile_is_denied() {
        let agent_id = AgentId::new();
        let resolver = PermissionResolver::new(Arc::new(StaticLookup(HashMap::new())));
        let decision = resolver.check(agent_id, "search_docs");
        assert!(!decision.allowed);
    }
}
