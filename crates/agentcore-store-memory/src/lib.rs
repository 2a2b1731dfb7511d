#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **agentcore-store-memory** – In-memory persistence driver for the Agent
//! Lifecycle & Runtime Core.
//!
//! Suitable for testing, development, and single-process deployments. All
//! data is lost when the process terminates. Mirrors
//! `toka-store-memory::MemoryBackend`'s shape: `HashMap`s behind an
//! `RwLock`, no I/O.

use agentcore_store_core::{PersistenceBackend, StoreError};
use agentcore_types::{AgentId, BudgetAlert, ManagedAgent, StateTransition};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// An in-memory, non-persistent implementation of `PersistenceBackend`.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    agents: RwLock<HashMap<AgentId, ManagedAgent>>,
    transitions: RwLock<HashMap<AgentId, Vec<StateTransition>>>,
    alerts: RwLock<Vec<BudgetAlert>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every persisted budget alert, oldest first.
    pub async fn all_alerts(&self) -> Vec<BudgetAlert> {
        self.alerts.read().await.clone()
    }

    /// Snapshot of the persisted transition log for one agent.
    pub async fn transitions_for(&self, agent_id: AgentId) -> Vec<StateTransition> {
        self.transitions
            .read()
            .await
            .get(&agent_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn upsert_managed_agent(&self, agent: &ManagedAgent) -> Result<(), StoreError> {
        self.agents.write().await.insert(agent.id, agent.clone());
        Ok(())
    }

    async fn delete_managed_agent(&self, id: AgentId) -> Result<(), StoreError> {
        self.agents.write().await.remove(&id);
        self.transitions.write().await.remove(&id);
        Ok(())
    }

    async fn get_all_managed_agents(&self) -> Result<Vec<ManagedAgent>, StoreError> {
        Ok(self.agents.read().await.values().cloned().collect())
    }

    async fn add_state_transition(
        &self,
        agent_id: AgentId,
        transition: &StateTransition,
    ) -> Result<(), StoreError> {
        self.transitions
            .write()
            .await
            .entry(agent_id)
            .or_default()
            .push(transition.clone());
        Ok(())
    }

    async fn add_budget_alert(&self, alert: &BudgetAlert) -> Result<(), StoreError> {
        self.alerts.write().await.push(alert.clone());
        Ok(())
    }

    async fn execute(&self, statement: &str, _params: &[serde_json::Value]) -> Result<(), StoreError> {
        debug!(statement, "in-memory backend treats execute() as an audit no-op");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_types::{AgentConfig, AgentState, OrgId};

    #[tokio::test]
    async fn upsert_then_get_all_round_trips() {
        let backend = MemoryBackend::new();
        let agent = ManagedAgent::new(AgentId::new(), OrgId::new(), AgentConfig::default());
        backend.upsert_managed_agent(&agent).await.unwrap();
        let all = backend.get_all_managed_agents().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, agent.id);
    }

    #[tokio::test]
    async fn delete_removes_agent_and_transitions() {
        let backend = MemoryBackend::new();
        let mut agent = ManagedAgent::new(AgentId::new(), OrgId::new(), AgentConfig::default());
        agent.transition(AgentState::Ready, "complete", "system", None);
        backend.upsert_managed_agent(&agent).await.unwrap();
        backend
            .add_state_transition(agent.id, agent.state_history.last().unwrap())
            .await
            .unwrap();
        backend.delete_managed_agent(agent.id).await.unwrap();
        assert!(backend.get_all_managed_agents().await.unwrap().is_empty());
        assert!(backend.transitions_for(agent.id).await.is_empty());
    }
}
