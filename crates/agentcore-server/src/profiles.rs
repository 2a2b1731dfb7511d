//! Agent-to-permission-profile index backing `PermissionResolver`'s
//! `AgentProfileLookup`.
//!
//! `PermissionResolver::check` must resolve an id synchronously, but
//! `ManagedAgent` records sit behind an async lock inside the lifecycle
//! manager. Rather than block on that lock from a sync trait method, the
//! server keeps its own `DashMap` index of `agent_id -> profile_id`,
//! populated whenever the engine surface creates or updates an agent.

use agentcore_permissions::AgentProfileLookup;
use agentcore_types::AgentId;
use dashmap::DashMap;
use std::sync::Arc;

/// A `DashMap`-backed `AgentProfileLookup` maintained by the engine
/// surface alongside the lifecycle manager's own agent records.
#[derive(Clone, Default)]
pub struct ProfileIndex {
    profiles: Arc<DashMap<AgentId, String>>,
}

impl ProfileIndex {
    /// Construct an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or replace the profile id declared for `agent_id`. A `None`
    /// profile id removes any existing entry.
    pub fn set(&self, agent_id: AgentId, profile_id: Option<&str>) {
        match profile_id {
            Some(id) => {
                self.profiles.insert(agent_id, id.to_string());
            }
            None => {
                self.profiles.remove(&agent_id);
            }
        }
    }

    /// Drop the entry for `agent_id`, e.g. on `destroy`.
    pub fn remove(&self, agent_id: AgentId) {
        self.profiles.remove(&agent_id);
    }
}

impl AgentProfileLookup for ProfileIndex {
    fn profile_id_for(&self, agent_id: AgentId) -> Option<String> {
        self.profiles.get(&agent_id).map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_agent_has_no_profile() {
        let index = ProfileIndex::new();
        assert_eq!(index.profile_id_for(AgentId::new()), None);
    }

    #[test]
    fn set_then_remove_round_trips() {
        let index = ProfileIndex::new();
        let agent_id = AgentId::new();
        index.set(agent_id, Some("default"));
        assert_eq!(index.profile_id_for(agent_id), Some("default".to_string()));
        index.remove(agent_id);
        assert_eq!(index.profile_id_for(agent_id), None);
    }
}
