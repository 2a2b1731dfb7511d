//! Debounced batched flush of usage-counter updates. State transitions
//! always persist synchronously through `LifecycleManager::persist`; only
//! `record_tool_call`'s counter tick goes through this path, so a burst of
//! tool calls produces one write per agent per debounce window instead of
//! one write per call.

use agentcore_resilience::{retry_with_backoff, BackoffPolicy};
use agentcore_store_core::PersistenceBackend;
use agentcore_types::{AgentId, ManagedAgent};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::{Mutex as TokioMutex, RwLock as TokioRwLock};
use tracing::warn;

/// Drain every currently-dirty agent id and persist its usage counters.
/// Ids that go missing from the agent map between being marked dirty and
/// the flush running (e.g. destroyed mid-window) are silently dropped.
pub(crate) async fn drain_dirty(
    agents: &Arc<DashMap<AgentId, Arc<TokioMutex<ManagedAgent>>>>,
    persistence: &Arc<TokioRwLock<Option<Arc<dyn PersistenceBackend>>>>,
    dirty: &Arc<DashSet<AgentId>>,
    retry_policy: BackoffPolicy,
) {
    let ids: Vec<AgentId> = dirty.iter().map(|entry| *entry).collect();
    let Some(backend) = persistence.read().await.clone() else {
        return;
    };
    for id in ids {
        dirty.remove(&id);
        let Some(handle) = agents.get(&id).map(|entry| entry.value().clone()) else {
            continue;
        };
        let snapshot = handle.lock().await.clone();
        let backend = backend.clone();
        let to_upsert = snapshot.clone();
        let result = retry_with_backoff(
            retry_policy,
            move || {
                let backend = backend.clone();
                let agent = to_upsert.clone();
                async move { backend.upsert_managed_agent(&agent).await }
            },
            |_err| true,
        )
        .await;
        if let Err(err) = result {
            warn!(agent_id = %id, error = %err, "exhausted retries flushing usage counters");
        }
    }
}
