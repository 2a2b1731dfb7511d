#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **agentcore-store-core** – Persistence abstractions for the Agent
//! Lifecycle & Runtime Core.
//!
//! This crate defines the narrow interface the core uses to treat
//! persistence as a write-through shadow of in-memory state. Drivers (a
//! tabular or document store) implement `PersistenceBackend` in separate
//! crates; `agentcore-store-memory` is the in-process reference
//! implementation used by default and by tests, grounded in
//! `toka-store-core`/`toka-store-memory`'s backend-trait split.

use agentcore_types::{AgentId, BudgetAlert, ManagedAgent, StateTransition};
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

/// Errors a persistence backend may report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend is unreachable or returned an I/O-level failure.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    /// The requested record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Narrow persistence contract used by the core. Implementations vary in
/// how they achieve each operation (tabular or document semantics); the
/// core makes no assumption beyond atomic single-row writes.
#[async_trait]
pub trait PersistenceBackend: Send + Sync + Debug {
    /// Insert or replace a managed agent record.
    async fn upsert_managed_agent(&self, agent: &ManagedAgent) -> Result<(), StoreError>;

    /// Remove a managed agent record. Not an error if already absent.
    async fn delete_managed_agent(&self, id: AgentId) -> Result<(), StoreError>;

    /// Load every managed agent record, used at startup to rehydrate state.
    async fn get_all_managed_agents(&self) -> Result<Vec<ManagedAgent>, StoreError>;

    /// Append a state transition to the durable transition log.
    async fn add_state_transition(
        &self,
        agent_id: AgentId,
        transition: &StateTransition,
    ) -> Result<(), StoreError>;

    /// Append a budget alert to the durable, append-only alert log.
    async fn add_budget_alert(&self, alert: &BudgetAlert) -> Result<(), StoreError>;

    /// Execute an opaque append-only statement against a named table, used
    /// for backends that route everything through a single generic
    /// execute path (e.g. a SQL driver). The in-memory reference backend
    /// treats this as a no-op audit sink.
    async fn execute(&self, statement: &str, params: &[serde_json::Value]) -> Result<(), StoreError>;
}
