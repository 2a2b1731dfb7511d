//! Registry mapping a deployment target's registry key to its adapter.

use crate::Deployer;
use agentcore_types::config::DeploymentTarget;
use dashmap::DashMap;
use std::sync::Arc;

/// Holds one `Deployer` adapter per registered target name. New targets
/// are added by calling `register`; the orchestrator itself never matches
/// on a closed enum of targets, so third-party adapters can be added
/// without recompiling this crate.
#[derive(Clone, Default)]
pub struct DeployerRegistry {
    adapters: Arc<DashMap<String, Arc<dyn Deployer>>>,
}

impl DeployerRegistry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the adapter for `target_key`.
    pub fn register(&self, target_key: impl Into<String>, adapter: Arc<dyn Deployer>) {
        self.adapters.insert(target_key.into(), adapter);
    }

    /// Look up the adapter for a given `DeploymentTarget`.
    pub fn get(&self, target: DeploymentTarget) -> Option<Arc<dyn Deployer>> {
        self.adapters.get(target.registry_key()).map(|entry| entry.clone())
    }

    /// Look up the adapter for an arbitrary registry key.
    pub fn get_by_key(&self, key: &str) -> Option<Arc<dyn Deployer>> {
        self.adapters.get(key).map(|entry| entry.clone())
    }
}
