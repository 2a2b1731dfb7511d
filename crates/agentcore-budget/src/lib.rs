#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **agentcore-budget** – multi-horizon token/cost budget enforcement for
//! the Agent Lifecycle & Runtime Core.
//!
//! `BudgetEnforcer::record_tool_call` is the single entry point: it
//! increments `UsageCounters`, evaluates horizon caps in the order the
//! specification fixes (daily -> weekly -> monthly -> annual -> warnings),
//! and returns the alerts that fired plus whether the agent should be
//! force-stopped. The enforcer does not itself mutate lifecycle state or
//! persistence — the lifecycle manager (the sole owner of `ManagedAgent`)
//! applies the returned evaluation. Threshold evaluation is generalized
//! from `toka-rate-limiter::policies`'s window/threshold shape to
//! multi-horizon cost and token budgets instead of a single request rate.

use agentcore_types::{
    AgentId, AlertKind, BudgetAlert, BudgetConfig, BudgetKind, ManagedAgent, OrgId,
};
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info};

/// Usage reported by a single tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolCallUsage {
    /// Tool invoked.
    pub tool_id: String,
    /// Tokens consumed, if known.
    pub tokens_used: Option<u64>,
    /// Cost incurred in USD, if known.
    pub cost_usd: Option<f64>,
    /// Whether this call had an externally visible side effect.
    pub is_external_action: bool,
    /// Whether the call resulted in an error.
    pub error: bool,
}

/// Result of evaluating one `record_tool_call`.
#[derive(Debug, Clone, Default)]
pub struct BudgetEvaluation {
    /// Alerts that fired as a result of this call, in firing order.
    pub alerts: Vec<BudgetAlert>,
    /// If set, the agent must be force-stopped with this reason.
    pub force_stop_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FiredKey {
    agent_id: AgentId,
    rule: String,
    budget_kind: BudgetKind,
}

/// Evaluates and tracks budget alerts across all agents.
pub struct BudgetEnforcer {
    fired_today: DashMap<FiredKey, NaiveDate>,
    alerts: Mutex<VecDeque<BudgetAlert>>,
}

/// Maximum alerts retained in memory (all are persisted regardless).
pub const ALERT_BUFFER_CAP: usize = agentcore_types::BUDGET_ALERT_CAP;

impl Default for BudgetEnforcer {
    fn default() -> Self {
        Self {
            fired_today: DashMap::new(),
            alerts: Mutex::new(VecDeque::new()),
        }
    }
}

impl BudgetEnforcer {
    /// Construct an empty enforcer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a tool call's usage to `agent` and evaluate budget rules.
    /// Mutates `agent.usage` counters unconditionally; only touches
    /// `agent.state` — never, the caller applies `force_stop_reason`.
    pub fn record_tool_call(&self, agent: &mut ManagedAgent, usage: ToolCallUsage) -> BudgetEvaluation {
        let tokens = usage.tokens_used.unwrap_or(0);
        let cost = usage.cost_usd.unwrap_or(0.0);

        agent.usage.today.tokens += tokens;
        agent.usage.today.cost_usd += cost;
        agent.usage.week.tokens += tokens;
        agent.usage.week.cost_usd += cost;
        agent.usage.month.tokens += tokens;
        agent.usage.month.cost_usd += cost;
        agent.usage.year.tokens += tokens;
        agent.usage.year.cost_usd += cost;
        agent.usage.legacy_monthly_cost_usd += cost;
        agent.usage.legacy_monthly_tokens += tokens;
        agent.usage.tool_calls_today += 1;
        agent.usage.tool_calls_month += 1;
        if usage.is_external_action {
            agent.usage.external_actions += 1;
        }
        if usage.error {
            agent.usage.error_count += 1;
        }
        agent.usage.last_updated = Utc::now();

        let mut evaluation = BudgetEvaluation::default();
        if let Some(budget) = agent.budget.clone() {
            self.evaluate_against_budget(agent, &budget, &mut evaluation);
        } else {
            debug!(agent_id = %agent.id, "no BudgetConfig set; usage recorded, no caps to evaluate");
        }
        evaluation
    }

    fn evaluate_against_budget(
        &self,
        agent: &ManagedAgent,
        budget: &BudgetConfig,
        evaluation: &mut BudgetEvaluation,
    ) {
        // Hard caps, strict horizon order: daily, weekly, monthly, annual.
        // The first exceeded cap wins — firing one terminates the
        // evaluation for this call, matching the "fire the exceeded alert
        // then force-stop" order the specification preserves.
        let exceed_checks: [(&str, AlertKind, f64, f64, Option<f64>, Option<u64>, u64, &str); 4] = [
            (
                "daily",
                AlertKind::DailyExceeded,
                agent.usage.today.cost_usd,
                agent.usage.today.tokens as f64,
                budget.cost_caps.daily,
                budget.token_caps.daily,
                agent.usage.today.tokens,
                "Daily",
            ),
            (
                "weekly",
                AlertKind::WeeklyExceeded,
                agent.usage.week.cost_usd,
                agent.usage.week.tokens as f64,
                budget.cost_caps.weekly,
                budget.token_caps.weekly,
                agent.usage.week.tokens,
                "Weekly",
            ),
            (
                "monthly",
                AlertKind::Exceeded,
                agent.usage.month.cost_usd,
                agent.usage.month.tokens as f64,
                budget.cost_caps.monthly,
                budget.token_caps.monthly,
                agent.usage.month.tokens,
                "Monthly",
            ),
            (
                "annual",
                AlertKind::AnnualExceeded,
                agent.usage.year.cost_usd,
                agent.usage.year.tokens as f64,
                budget.cost_caps.annual,
                budget.token_caps.annual,
                agent.usage.year.tokens,
                "Annual",
            ),
        ];

        for (rule, kind, cost_value, _tokens_f64, cost_cap, token_cap, tokens_value, label) in exceed_checks {
            if let Some(cap) = cost_cap {
                if cost_value >= cap && self.try_fire(agent.id, rule, BudgetKind::Cost) {
                    evaluation
                        .alerts
                        .push(self.build_alert(agent, kind, BudgetKind::Cost, cost_value, cap));
                    evaluation.force_stop_reason =
                        Some(format!("{label} cost budget exceeded"));
                }
            }
            if let Some(cap) = token_cap {
                if tokens_value >= cap && self.try_fire(agent.id, rule, BudgetKind::Tokens) {
                    evaluation.alerts.push(self.build_alert(
                        agent,
                        kind,
                        BudgetKind::Tokens,
                        tokens_value as f64,
                        cap as f64,
                    ));
                    evaluation.force_stop_reason =
                        Some(format!("{label} token budget exceeded"));
                }
            }
        }

        // Warning thresholds: evaluated across every horizon with a
        // nonzero cap, independent of whether a hard cap already fired.
        let horizons: [(&str, f64, f64, Option<f64>, Option<u64>, u64); 4] = [
            (
                "daily",
                agent.usage.today.cost_usd,
                agent.usage.today.tokens as f64,
                budget.cost_caps.daily,
                budget.token_caps.daily,
                agent.usage.today.tokens,
            ),
            (
                "weekly",
                agent.usage.week.cost_usd,
                agent.usage.week.tokens as f64,
                budget.cost_caps.weekly,
                budget.token_caps.weekly,
                agent.usage.week.tokens,
            ),
            (
                "monthly",
                agent.usage.month.cost_usd,
                agent.usage.month.tokens as f64,
                budget.cost_caps.monthly,
                budget.token_caps.monthly,
                agent.usage.month.tokens,
            ),
            (
                "annual",
                agent.usage.year.cost_usd,
                agent.usage.year.tokens as f64,
                budget.cost_caps.annual,
                budget.token_caps.annual,
                agent.usage.year.tokens,
            ),
        ];

        for threshold in &budget.warning_thresholds {
            for (horizon, cost_value, _tokens_f64, cost_cap, token_cap, tokens_value) in horizons {
                let rule = format!("{horizon}_warning_{threshold}");
                if let Some(cap) = cost_cap {
                    if cap > 0.0 && cost_value >= cap * (*threshold as f64 / 100.0) {
                        if self.try_fire(agent.id, &rule, BudgetKind::Cost) {
                            evaluation.alerts.push(self.build_alert(
                                agent,
                                AlertKind::Warning(*threshold),
                                BudgetKind::Cost,
                                cost_value,
                                cap,
                            ));
                        }
                    }
                }
                if let Some(cap) = token_cap {
                    if cap > 0 && tokens_value >= cap as f64 * (*threshold as f64 / 100.0) {
                        if self.try_fire(agent.id, &rule, BudgetKind::Tokens) {
                            evaluation.alerts.push(self.build_alert(
                                agent,
                                AlertKind::Warning(*threshold),
                                BudgetKind::Tokens,
                                tokens_value,
                                cap as f64,
                            ));
                        }
                    }
                }
            }
        }
    }

    fn try_fire(&self, agent_id: AgentId, rule: &str, budget_kind: BudgetKind) -> bool {
        let key = FiredKey {
            agent_id,
            rule: rule.to_string(),
            budget_kind,
        };
        let today = Utc::now().date_naive();
        match self.fired_today.get(&key) {
            Some(date) if *date == today => false,
            _ => {
                self.fired_today.insert(key, today);
                true
            }
        }
    }

    fn build_alert(
        &self,
        agent: &ManagedAgent,
        kind: AlertKind,
        budget_kind: BudgetKind,
        current_value: f64,
        limit_value: f64,
    ) -> BudgetAlert {
        let alert = BudgetAlert {
            id: uuid::Uuid::new_v4(),
            org_id: agent.org_id,
            agent_id: agent.id,
            kind,
            budget_kind,
            current_value,
            limit_value,
            acknowledged: false,
            created_at: Utc::now(),
        };
        let mut alerts = self.alerts.lock().expect("budget alert buffer poisoned");
        if alerts.len() >= ALERT_BUFFER_CAP {
            alerts.pop_front();
        }
        alerts.push_back(alert.clone());
        info!(agent_id = %agent.id, kind = ?alert.kind, "budget alert fired");
        alert
    }

    /// Snapshot of in-memory alerts, most recent last.
    pub fn recent_alerts(&self) -> Vec<BudgetAlert> {
        self.alerts.lock().expect("budget alert buffer poisoned").iter().cloned().collect()
    }

    /// Clear the fired-alert set for one agent. Called on daily rollover
    /// so the same warning can fire again the next day.
    pub fn clear_fired_alerts_for(&self, agent_id: AgentId) {
        self.fired_today.retain(|key, _| key.agent_id != agent_id);
    }

    /// Clear the fired-alert set for every agent (full daily rollover).
    pub fn clear_all_fired_alerts(&self) {
        self.fired_today.clear();
    }
}

/// Helper used by callers constructing a `ToolCallUsage` for a plain,
/// non-side-effecting successful call.
pub fn simple_usage(tool_id: impl Into<String>, tokens_used: u64, cost_usd: f64) -> ToolCallUsage {
    ToolCallUsage {
        tool_id: tool_id.into(),
        tokens_used: Some(tokens_used),
        cost_usd: Some(cost_usd),
        is_external_action: false,
        error: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_types::{AgentConfig, HorizonCaps};

    fn agent_with_budget(daily_cost_cap: f64) -> ManagedAgent {
        let mut agent = ManagedAgent::new(AgentId::new(), OrgId::new(), AgentConfig::default());
        agent.budget = Some(BudgetConfig {
            cost_caps: HorizonCaps {
                daily: Some(daily_cost_cap),
                ..Default::default()
            },
            token_caps: HorizonCaps::default(),
            warning_thresholds: vec![50, 80, 95],
            org_pool_id: None,
        });
        agent
    }

    #[test]
    fn daily_cost_cap_fires_once_and_forces_stop() {
        let enforcer = BudgetEnforcer::new();
        let mut agent = agent_with_budget(1.00);
        enforcer.record_tool_call(&mut agent, simple_usage("t1", 10, 0.50));
        let eval2 = enforcer.record_tool_call(&mut agent, simple_usage("t2", 10, 0.30));
        assert!(eval2.force_stop_reason.is_none());
        let eval3 = enforcer.record_tool_call(&mut agent, simple_usage("t3", 10, 0.21));
        assert_eq!(
            eval3.force_stop_reason.as_deref(),
            Some("Daily cost budget exceeded")
        );
        let exceeded_alerts: Vec<_> = eval3
            .alerts
            .iter()
            .filter(|a| a.kind == AlertKind::DailyExceeded)
            .collect();
        assert_eq!(exceeded_alerts.len(), 1);

        // A further call must not fire `daily_exceeded` again today.
        let eval4 = enforcer.record_tool_call(&mut agent, simple_usage("t4", 1, 0.01));
        assert!(!eval4
            .alerts
            .iter()
            .any(|a| a.kind == AlertKind::DailyExceeded));
    }

    #[test]
    fn warning_at_80_percent_fires_once() {
        let enforcer = BudgetEnforcer::new();
        let mut agent = agent_with_budget(10.0);
        enforcer.record_tool_call(&mut agent, simple_usage("t1", 0, 7.9));
        let eval = enforcer.record_tool_call(&mut agent, simple_usage("t2", 0, 0.2));
        assert!(eval
            .alerts
            .iter()
            .any(|a| a.kind == AlertKind::Warning(80)));
        let eval_again = enforcer.record_tool_call(&mut agent, simple_usage("t3", 0, 0.01));
        assert!(!eval_again
            .alerts
            .iter()
            .any(|a| a.kind == AlertKind::Warning(80)));
    }

    #[test]
    fn clearing_fired_alerts_allows_refire_next_day() {
        let enforcer = BudgetEnforcer::new();
        let mut agent = agent_with_budget(1.0);
        enforcer.record_tool_call(&mut agent, simple_usage("t1", 0, 1.5));
        enforcer.clear_all_fired_alerts();
        let eval = enforcer.record_tool_call(&mut agent, simple_usage("t2", 0, 0.01));
        assert!(eval
            .alerts
            .iter()
            .any(|a| a.kind == AlertKind::DailyExceeded));
    }

    #[test]
    fn no_budget_config_does_not_force_stop() {
        let enforcer = BudgetEnforcer::new();
        let mut agent = ManagedAgent::new(AgentId::new(), OrgId::new(), AgentConfig::default());
        let eval = enforcer.record_tool_call(&mut agent, simple_usage("t1", 1_000_000, 999.0));
        assert!(eval.force_stop_reason.is_none());
        assert_eq!(agent.usage.legacy_monthly_cost_usd, 999.0);
    }
}
