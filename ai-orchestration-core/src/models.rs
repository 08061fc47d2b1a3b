//! # Request/Response Data Model
//!
//! The types the `Orchestrator` accepts and returns. `AIRequest` is built by
//! the caller and handed to `Orchestrator::execute`; it is single-owner and
//! never mutated after validation. `AIResponse` is the uniform completion
//! contract returned regardless of which of the four providers served it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of request categories. Drives `PromptAssembler`'s default
/// token budget, `CascadeRouter`'s chain selection, and governance gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    CodeGeneration,
    CodeReview,
    Security,
    Planning,
    Analysis,
    Chat,
    Query,
    Summarize,
    ParseCommand,
    Heartbeat,
}

/// Request urgency. `URGENT` requests are exempt from the budget-pause block
/// (see `CostTracker::canProceed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Urgent,
    Standard,
    Background,
}

/// Opaque caller-trust classification; carried through untouched by the core,
/// consumed only by `Governance` implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Trusted,
    Standard,
    Untrusted,
}

/// `ValueScorer`'s complexity classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Trivial,
    Simple,
    Standard,
    Complex,
    Critical,
}

/// The four-value finish-reason enum every provider maps its own vocabulary
/// onto; unrecognized upstream values map to `Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    MaxTokens,
    ToolUse,
    Error,
}

/// A single turn in prior conversation history. There is no `Tool`/`System`
/// role here: system content is carried separately on
/// `AIRequest::system_prompt`, and tool-call plumbing is out of this
/// engine's scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
}

/// Inbound request to `Orchestrator::execute`.
///
/// Invariants (enforced at step 1, `InvalidRequest` otherwise): `content`
/// non-empty; if `messages` is non-empty, its last entry's role is `User`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIRequest {
    pub content: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    pub category: Category,
    pub agent: String,
    #[serde(default = "default_trust_level")]
    pub trust_level: TrustLevel,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default = "default_true")]
    pub enable_caching: bool,
    #[serde(default)]
    pub security_sensitive: bool,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "Uuid::new_v4")]
    pub request_id: Uuid,
}

fn default_trust_level() -> TrustLevel {
    TrustLevel::Standard
}
fn default_priority() -> Priority {
    Priority::Standard
}
fn default_true() -> bool {
    true
}

impl AIRequest {
    /// A minimal request builder for the `query`/`chat`/`summarize`
    /// convenience wrappers, which construct an `AIRequest`
    /// internally rather than exposing one.
    pub fn new(content: impl Into<String>, category: Category, agent: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            system_prompt: None,
            messages: Vec::new(),
            category,
            agent: agent.into(),
            trust_level: TrustLevel::Standard,
            priority: Priority::Standard,
            enable_caching: true,
            security_sensitive: false,
            max_tokens: None,
            request_id: Uuid::new_v4(),
        }
    }

    /// Step 1 of the orchestrator pipeline. Re-validating an already-valid
    /// request is a no-op.
    pub fn validate(&self) -> Result<(), String> {
        if self.content.is_empty() {
            return Err("content must not be empty".to_string());
        }
        if let Some(last) = self.messages.last() {
            if last.role != ConversationRole::User {
                return Err("last message role must be user".to_string());
            }
        }
        Ok(())
    }
}

/// Uniform completion contract returned by `Orchestrator::execute`,
/// independent of which provider actually served the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIResponse {
    pub request_id: Uuid,
    pub content: String,
    pub model: String,
    pub provider: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Dollars, converted from `Microcents` only here, at the reporting
    /// boundary.
    pub cost: f64,
    pub duration_ms: u64,
    pub cached: bool,
    pub quality_score: f64,
    pub escalated: bool,
    pub escalation_reason: Option<String>,
    pub governance_approved: Option<bool>,
}

/// `parseCommand`'s best-effort decode result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub intent: String,
    pub entities: serde_json::Value,
    pub confidence: f64,
    pub raw: String,
}

impl ParsedCommand {
    pub fn unknown(raw: impl Into<String>) -> Self {
        Self {
            intent: "unknown".to_string(),
            entities: serde_json::json!({}),
            confidence: 0.0,
            raw: raw.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_is_invalid() {
        let req = AIRequest::new("", Category::Query, "agent-1");
        assert!(req.validate().is_err());
    }

    #[test]
    fn non_user_trailing_message_is_invalid() {
        let mut req = AIRequest::new("hi", Category::Chat, "agent-1");
        req.messages.push(ConversationMessage {
            role: ConversationRole::Assistant,
            content: "previous reply".into(),
        });
        assert!(req.validate().is_err());
    }

    #[test]
    fn valid_request_passes_and_is_idempotent() {
        let req = AIRequest::new("hello there", Category::Chat, "agent-1");
        assert!(req.validate().is_ok());
        assert!(req.validate().is_ok());
    }
}
