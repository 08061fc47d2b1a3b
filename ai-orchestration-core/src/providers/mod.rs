//! # LLMProvider
//!
//! The uniform completion contract every upstream adapter implements, plus
//! the shared per-provider health ladder (failures 0 → healthy, >=2 →
//! degraded, >=5 → down; internal circuit mirror >=3 → half-open, >=5 →
//! open, reset on success). Four concrete variants implement this trait —
//! `anthropic`, `openai`, `google`, `xai` — each keeping its own upstream
//! SDK quirks local.
//!
//! Request building, auth header injection, and upstream error-response
//! mapping are shared through `HttpProviderClient` (`http_client.rs`), a
//! per-provider HTTP client pattern with SSE streaming via `async-stream`'s
//! `stream!` macro.

pub mod anthropic;
pub mod google;
pub mod http_client;
pub mod openai;
pub mod xai;

use crate::error::ProviderError;
use crate::model_registry::ModelTier;
use crate::models::FinishReason;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// One-shot construction input`); in Rust
/// this is the constructor argument rather than a separate `initialize`
/// call, since providers are immutable for their process lifetime once
/// built.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Declared priority for `completeWithFallback`'s ordering across
    /// providers that support the same logical model; higher
    /// runs first.
    pub priority: u32,
    pub enabled: bool,
    pub headers: HashMap<String, String>,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            priority: 50,
            enabled: true,
            headers: HashMap::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

/// A single system-prompt block, possibly cache-marked. Built by
/// `PromptAssembler`, consumed by every provider variant, which decides
/// locally how to express "ephemeral cache" in its own wire format
/// (Anthropic's `cache_control` block, OpenAI's/xAI's automatic prefix
/// cache which ignores the marker, Google's manual context cache).
#[derive(Debug, Clone)]
pub struct SystemBlock {
    pub text: String,
    pub cache_marked: bool,
}

/// Provider-neutral payload `PromptAssembler` produces and every `complete`
/// call consumes.
#[derive(Debug, Clone)]
pub struct PromptPayload {
    pub system: Vec<SystemBlock>,
    pub messages: Vec<crate::models::ConversationMessage>,
    pub max_tokens: u32,
}

/// What a provider's `complete`/`stream` call needs beyond the payload:
/// which tier to call and whether caching was requested for this request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub tier: ModelTier,
    pub payload: PromptPayload,
    pub caching_enabled: bool,
}

/// `{content, model, inputTokens, outputTokens, cachedInputTokens,
/// cacheWriteTokens, durationMs, finishReason}` Providers
/// never compute dollar cost — only token counts, enriched with cost by
/// `ProviderRegistry`.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cached_input_tokens: u32,
    pub cache_write_tokens: u32,
    pub duration_ms: u64,
    pub finish_reason: FinishReason,
}

/// Lazy, finite, non-restartable stream record.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCall { name: String, arguments: String },
    Done,
}

pub type StreamResult = Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>>;

#[derive(Debug, Clone)]
pub struct ConnectionTestResult {
    pub connected: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderCircuitMirror {
    Closed,
    HalfOpen,
    Open,
}

#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub status: HealthStatus,
    pub last_check_at: chrono::DateTime<chrono::Utc>,
    pub last_success_at: Option<chrono::DateTime<chrono::Utc>>,
    pub latency_ms: Option<u64>,
    pub consecutive_failures: u32,
    pub circuit_breaker_state: ProviderCircuitMirror,
}

/// Shared health-ladder bookkeeping every variant embeds, rather than
/// reimplementing the failure counter per provider. Each adapter calls
/// `record_success`/`record_failure` around its own upstream call and
/// exposes the result via `get_health_status`.
pub struct HealthTracker {
    consecutive_failures: AtomicU32,
    last_check_at: std::sync::Mutex<chrono::DateTime<chrono::Utc>>,
    last_success_at: std::sync::Mutex<Option<chrono::DateTime<chrono::Utc>>>,
    last_latency_ms: AtomicU32,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            last_check_at: std::sync::Mutex::new(chrono::Utc::now()),
            last_success_at: std::sync::Mutex::new(None),
            last_latency_ms: AtomicU32::new(0),
        }
    }

    pub fn record_success(&self, latency_ms: u64) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_latency_ms
            .store(latency_ms.min(u32::MAX as u64) as u32, Ordering::Relaxed);
        *self.last_check_at.lock().unwrap() = chrono::Utc::now();
        *self.last_success_at.lock().unwrap() = Some(chrono::Utc::now());
    }

    pub fn record_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_check_at.lock().unwrap() = chrono::Utc::now();
    }

    pub fn status(&self) -> ProviderHealth {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        let status = if failures >= 5 {
            HealthStatus::Down
        } else if failures >= 2 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        let circuit_breaker_state = if failures >= 5 {
            ProviderCircuitMirror::Open
        } else if failures >= 3 {
            ProviderCircuitMirror::HalfOpen
        } else {
            ProviderCircuitMirror::Closed
        };
        let latency = self.last_latency_ms.load(Ordering::Relaxed);
        ProviderHealth {
            status,
            last_check_at: *self.last_check_at.lock().unwrap(),
            last_success_at: *self.last_success_at.lock().unwrap(),
            latency_ms: if latency > 0 { Some(latency as u64) } else { None },
            consecutive_failures: failures,
            circuit_breaker_state,
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps an arbitrary upstream finish-reason string onto the exhaustive
/// four-value enum; unknown values map to `Stop`.
pub fn map_finish_reason(raw: &str) -> FinishReason {
    match raw {
        "stop" | "end_turn" | "STOP" | "stop_sequence" => FinishReason::Stop,
        "length" | "max_tokens" | "MAX_TOKENS" => FinishReason::MaxTokens,
        "tool_calls" | "tool_use" | "function_call" => FinishReason::ToolUse,
        "error" | "content_filter" | "SAFETY" | "RECITATION" => FinishReason::Error,
        _ => FinishReason::Stop,
    }
}

/// The contract every provider variant implements. No
/// inheritance hierarchy — four concrete structs behind this one trait
/// object, selected by `ProviderRegistry`.
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    fn id(&self) -> crate::model_registry::ProviderId;
    fn priority(&self) -> u32;

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
    async fn stream(&self, req: CompletionRequest) -> Result<StreamResult, ProviderError>;

    /// Minimal cheap call against the smallest model this provider serves.
    async fn test_connection(&self) -> ConnectionTestResult;

    fn list_models(&self) -> Vec<ModelTier>;
    fn supports_model(&self, tier: ModelTier) -> bool {
        self.list_models().contains(&tier)
    }
    fn supports_caching(&self) -> bool;

    fn get_health_status(&self) -> ProviderHealth;

    /// Releases connection pools. Isolated per provider: a failure here
    /// must not prevent other providers from shutting down.
    async fn shutdown(&self) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_ladder_matches_spec_thresholds() {
        let tracker = HealthTracker::new();
        assert_eq!(tracker.status().status, HealthStatus::Healthy);

        tracker.record_failure();
        assert_eq!(tracker.status().status, HealthStatus::Healthy);
        tracker.record_failure();
        assert_eq!(tracker.status().status, HealthStatus::Degraded);
        assert_eq!(
            tracker.status().circuit_breaker_state,
            ProviderCircuitMirror::Closed
        );

        tracker.record_failure();
        assert_eq!(
            tracker.status().circuit_breaker_state,
            ProviderCircuitMirror::HalfOpen
        );

        tracker.record_failure();
        tracker.record_failure();
        assert_eq!(tracker.status().status, HealthStatus::Down);
        assert_eq!(
            tracker.status().circuit_breaker_state,
            ProviderCircuitMirror::Open
        );
    }

    #[test]
    fn success_resets_failure_ladder() {
        let tracker = HealthTracker::new();
        tracker.record_failure();
        tracker.record_failure();
        tracker.record_failure();
        tracker.record_success(42);
        assert_eq!(tracker.status().status, HealthStatus::Healthy);
        assert_eq!(tracker.status().consecutive_failures, 0);
    }

    #[test]
    fn unknown_finish_reason_maps_to_stop() {
        assert_eq!(map_finish_reason("something_new"), FinishReason::Stop);
        assert_eq!(map_finish_reason("max_tokens"), FinishReason::MaxTokens);
    }
}
