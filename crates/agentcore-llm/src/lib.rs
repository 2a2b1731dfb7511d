#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **agentcore-llm** – the narrow `generate-reply` / `report-usage` hook
//! boundary the core calls across to invoke model inference.
//!
//! Model invocation itself is explicitly out of scope for the core (see
//! the specification's non-goals); this crate only defines the contract,
//! generalized from `toka-llm-gateway::LlmGateway::complete`'s
//! request/response/usage shape so the gateway and budget enforcer have a
//! stable seam to call across without depending on any concrete provider.

use agentcore_types::AgentId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A request to generate the agent's next reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateReplyRequest {
    /// Agent generating the reply.
    pub agent_id: AgentId,
    /// Optional system prompt override for this call.
    pub system_prompt: Option<String>,
    /// The conversation turn to respond to.
    pub message: String,
}

/// Usage reported alongside a generated reply, fed into the budget
/// enforcer via `record_tool_call`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportedUsage {
    /// Tokens consumed by this call.
    pub tokens_used: u64,
    /// Cost incurred by this call, in USD.
    pub cost_usd: f64,
}

/// The generated reply plus the usage it incurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateReplyResponse {
    /// Generated text.
    pub content: String,
    /// Usage incurred generating it.
    pub usage: ReportedUsage,
}

/// Hook boundary the core calls across to invoke model inference.
/// Implementations live entirely outside the core.
#[async_trait]
pub trait LlmHook: Send + Sync {
    /// Generate the agent's next reply.
    async fn generate_reply(
        &self,
        request: GenerateReplyRequest,
    ) -> Result<GenerateReplyResponse, String>;

    /// Report usage for a call that did not go through `generate_reply`
    /// directly (e.g. a tool call that itself invoked the model).
    async fn report_usage(&self, agent_id: AgentId, usage: ReportedUsage);
}
