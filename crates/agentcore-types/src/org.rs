//! Organization record and plan limits.

use crate::ids::OrgId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier governing default plan limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Free tier.
    Free,
    /// Paid team tier.
    Team,
    /// Paid enterprise tier.
    Enterprise,
}

/// Caps enforced independently of any per-agent `BudgetConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Maximum number of agents the organization may create.
    pub max_agents: u32,
    /// Monthly cost cap across all agents, in USD.
    pub monthly_cost_cap_usd: f64,
    /// Monthly token cap across all agents.
    pub monthly_token_cap: u64,
}

/// An organization owning a set of managed agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    /// Stable identifier.
    pub id: OrgId,
    /// Display name.
    pub name: String,
    /// Subdomain used for routing/branding.
    pub subdomain: String,
    /// Subscription tier.
    pub plan_tier: PlanTier,
    /// Plan limits in effect.
    pub plan_limits: PlanLimits,
    /// When the organization was created.
    pub created_at: DateTime<Utc>,
    /// When the organization was soft-deleted, if at all.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Organization {
    /// Whether the organization has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
