//! Usage counters and budget configuration/alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token and cost totals for one horizon (e.g. "today").
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonTotals {
    /// Tokens consumed in this horizon.
    pub tokens: u64,
    /// Cost, in USD, incurred in this horizon.
    pub cost_usd: f64,
}

/// Usage counters tracked per agent across four rollover horizons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageCounters {
    /// Totals for the current day.
    pub today: HorizonTotals,
    /// Totals for the current ISO week.
    pub week: HorizonTotals,
    /// Totals for the current calendar month.
    pub month: HorizonTotals,
    /// Totals for the current calendar year.
    pub year: HorizonTotals,
    /// Tool calls recorded today.
    pub tool_calls_today: u64,
    /// Tool calls recorded this month.
    pub tool_calls_month: u64,
    /// Count of tool calls flagged as external side-effecting actions.
    pub external_actions: u64,
    /// Count of tool calls that reported an error.
    pub error_count: u64,
    /// Rolling error rate over the last hour (errors / total calls).
    pub error_rate_1h: f64,
    /// Count of currently active sessions for this agent.
    pub active_sessions: u64,
    /// Legacy monthly-only cost field, kept for backward compatibility with
    /// agents that predate per-horizon `BudgetConfig`.
    pub legacy_monthly_cost_usd: f64,
    /// Legacy monthly-only token field, same rationale as above.
    pub legacy_monthly_tokens: u64,
    /// Last time any counter was updated.
    pub last_updated: DateTime<Utc>,
}

impl Default for UsageCounters {
    fn default() -> Self {
        Self {
            today: HorizonTotals::default(),
            week: HorizonTotals::default(),
            month: HorizonTotals::default(),
            year: HorizonTotals::default(),
            tool_calls_today: 0,
            tool_calls_month: 0,
            external_actions: 0,
            error_count: 0,
            error_rate_1h: 0.0,
            active_sessions: 0,
            legacy_monthly_cost_usd: 0.0,
            legacy_monthly_tokens: 0,
            last_updated: Utc::now(),
        }
    }
}

impl UsageCounters {
    /// Reset the daily bucket (and daily tool-call counter). Callers are
    /// responsible for clearing the per-day fired-alert set alongside this.
    pub fn rollover_daily(&mut self) {
        self.today = HorizonTotals::default();
        self.tool_calls_today = 0;
        self.last_updated = Utc::now();
    }

    /// Reset the weekly bucket.
    pub fn rollover_weekly(&mut self) {
        self.week = HorizonTotals::default();
        self.last_updated = Utc::now();
    }

    /// Reset the monthly bucket (and legacy monthly fields).
    pub fn rollover_monthly(&mut self) {
        self.month = HorizonTotals::default();
        self.tool_calls_month = 0;
        self.legacy_monthly_cost_usd = 0.0;
        self.legacy_monthly_tokens = 0;
        self.last_updated = Utc::now();
    }

    /// Reset the annual bucket.
    pub fn rollover_annual(&mut self) {
        self.year = HorizonTotals::default();
        self.last_updated = Utc::now();
    }
}

/// Which horizon a budget rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    /// Daily cap.
    Daily,
    /// Weekly cap.
    Weekly,
    /// Monthly cap.
    Monthly,
    /// Annual cap.
    Annual,
}

/// Per-horizon caps on cost and tokens, plus warning thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Cost cap in USD, per horizon. `None` means uncapped for that horizon.
    pub cost_caps: HorizonCaps<f64>,
    /// Token cap, per horizon. `None` means uncapped for that horizon.
    pub token_caps: HorizonCaps<u64>,
    /// Warning thresholds, as whole percentages of the applicable cap.
    pub warning_thresholds: Vec<u8>,
    /// Optional id of an organization-level budget pool this agent draws
    /// from instead of (or in addition to) its own caps.
    pub org_pool_id: Option<String>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            cost_caps: HorizonCaps::default(),
            token_caps: HorizonCaps::default(),
            warning_thresholds: crate::DEFAULT_WARNING_THRESHOLDS.to_vec(),
            org_pool_id: None,
        }
    }
}

/// Caps for each of the four horizons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonCaps<T> {
    /// Daily cap.
    pub daily: Option<T>,
    /// Weekly cap.
    pub weekly: Option<T>,
    /// Monthly cap.
    pub monthly: Option<T>,
    /// Annual cap.
    pub annual: Option<T>,
}

/// What kind of budget an alert concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    /// A cost cap.
    Cost,
    /// A token cap.
    Tokens,
}

/// The kind of alert fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A warning threshold (e.g. 50/80/95 percent) was crossed.
    Warning(u8),
    /// The daily cap was exceeded.
    DailyExceeded,
    /// The weekly cap was exceeded.
    WeeklyExceeded,
    /// The monthly cap was exceeded (legacy name: `exceeded`).
    Exceeded,
    /// The annual cap was exceeded.
    AnnualExceeded,
}

/// A persisted, append-only budget alert record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAlert {
    /// Stable identifier.
    pub id: uuid::Uuid,
    /// Owning organization.
    pub org_id: crate::OrgId,
    /// Agent this alert concerns.
    pub agent_id: crate::AgentId,
    /// Kind of alert.
    pub kind: AlertKind,
    /// Which budget (cost or tokens) the alert concerns.
    pub budget_kind: BudgetKind,
    /// The usage value observed when the alert fired.
    pub current_value: f64,
    /// The cap value in effect when the alert fired.
    pub limit_value: f64,
    /// Whether an operator has acknowledged this alert.
    pub acknowledged: bool,
    /// When the alert was created.
    pub created_at: DateTime<Utc>,
}
