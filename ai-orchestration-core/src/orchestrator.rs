//! # Orchestrator
//!
//! The 15-step pipeline behind the single `execute(request)` entry point
//! every collaborator in this crate is built to serve. Constructed with
//! injected collaborators — no global singleton, callers wrap it in `Arc`
//! and share it across concurrently-served requests.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::common::Microcents;
use crate::cost_tracker::CostTracker;
use crate::error::OrchestratorError;
use crate::events::{
    CircuitBreakerStateChanged, Event, EventBus, ModelSelected, RequestComplete, RequestReceived,
    RequestStart, ResponseEvaluated,
};
use crate::governance::{request_approval_with_deadline, Governance, DEFAULT_APPROVAL_DEADLINE};
use crate::model_registry::{ModelRegistry, ModelTier};
use crate::models::{AIRequest, AIResponse, Category, ConversationMessage, ConversationRole, ParsedCommand};
use crate::prompt_assembler::PromptAssembler;
use crate::provider_registry::ProviderRegistry;
use crate::providers::CompletionRequest;
use crate::response_evaluator::ResponseEvaluator;
use crate::value_scorer::{ScoringInput, ValueScorer};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The enumerated feature-flag set Not a bag of ambient
/// globals: one `FeatureFlags` value is handed to `Orchestrator::new` and
/// read thereafter, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct FeatureFlags {
    pub orchestrator_enabled: bool,
    pub prompt_caching_enabled: bool,
    pub governance_enabled: bool,
    pub quality_escalation_enabled: bool,
    /// Governance gating threshold in dollars, beyond the enumerated
    /// triggers (`category`, `securitySensitive`). The exact numeric
    /// threshold is a customization surface; $1.00 is this engine's
    /// documented default.
    pub governance_cost_threshold_dollars: f64,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            orchestrator_enabled: true,
            prompt_caching_enabled: true,
            governance_enabled: false,
            quality_escalation_enabled: true,
            governance_cost_threshold_dollars: 1.0,
        }
    }
}

/// A cooperative cancellation signal `execute` checks at well-defined
/// pre-upstream points and races against the upstream call itself in step 9.
/// Cheap to clone and share with the caller that wants to abort an
/// in-flight request.
pub type CancellationToken = tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Metrics {
    total_requests: u64,
    total_errors: u64,
    total_cost: Microcents,
    total_latency_ms: u64,
    latency_samples: u64,
    model_usage: HashMap<ModelTier, u64>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorStatus {
    pub orchestrator_enabled: bool,
    pub circuit_breaker_state: CircuitState,
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_cost: f64,
    pub average_latency_ms: f64,
    pub model_usage: HashMap<ModelTier, u64>,
    pub uptime_secs: u64,
}

pub struct Orchestrator {
    event_bus: Arc<dyn EventBus>,
    providers: Arc<ProviderRegistry>,
    cost_tracker: Arc<dyn CostTracker>,
    governance: Option<Arc<dyn Governance>>,
    feature_flags: FeatureFlags,
    circuit_breaker: CircuitBreaker,
    model_registry: ModelRegistry,
    value_scorer: ValueScorer,
    prompt_assembler: PromptAssembler,
    response_evaluator: ResponseEvaluator,
    metrics: Mutex<Metrics>,
    started_at: Instant,
}

impl Orchestrator {
    pub fn new(
        event_bus: Arc<dyn EventBus>,
        providers: Arc<ProviderRegistry>,
        cost_tracker: Arc<dyn CostTracker>,
        governance: Option<Arc<dyn Governance>>,
        feature_flags: FeatureFlags,
    ) -> Self {
        Self {
            event_bus,
            providers,
            cost_tracker,
            governance,
            feature_flags,
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
            model_registry: ModelRegistry::new(),
            value_scorer: ValueScorer::new(ModelRegistry::new()),
            prompt_assembler: PromptAssembler::new(),
            response_evaluator: ResponseEvaluator::new(),
            metrics: Mutex::new(Metrics::default()),
            started_at: Instant::now(),
        }
    }

    /// Whether `category`, cost, or `securitySensitive` trips the
    /// governance gate. A deliberately conservative rule, since there is no
    /// exhaustive list of which categories and cost levels warrant
    /// approval.
    fn requires_approval(&self, request: &AIRequest, estimated_cost_dollars: f64) -> bool {
        matches!(request.category, Category::Security | Category::Planning)
            || estimated_cost_dollars > self.feature_flags.governance_cost_threshold_dollars
            || request.security_sensitive
    }

    async fn record_metrics(&self, tier: Option<ModelTier>, cost: Microcents, latency_ms: u64, success: bool) {
        let mut metrics = self.metrics.lock().await;
        metrics.total_requests += 1;
        if !success {
            metrics.total_errors += 1;
        }
        metrics.total_cost = metrics.total_cost.saturating_add(cost);
        metrics.total_latency_ms += latency_ms;
        metrics.latency_samples += 1;
        if let Some(tier) = tier {
            *metrics.model_usage.entry(tier).or_insert(0) += 1;
        }
    }

    /// Emits the terminal `llm:request_complete` this pipeline guarantees
    /// exactly once per request, success or failure, and folds the outcome
    /// into aggregate metrics.
    async fn emit_terminal(
        &self,
        model: &str,
        tier: Option<ModelTier>,
        category: Category,
        input_tokens: u32,
        output_tokens: u32,
        cost: Microcents,
        duration_ms: u64,
        success: bool,
    ) {
        self.event_bus.emit(Event::RequestComplete(RequestComplete {
            timestamp: chrono::Utc::now(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost: cost.to_dollars(),
            task_type: "completion".to_string(),
            task_category: category,
            duration_ms,
            success,
        }));
        self.record_metrics(tier, cost, duration_ms, success).await;
    }

    async fn record_circuit_transition(&self, success: bool) {
        let transition = if success {
            self.circuit_breaker.record_success().await
        } else {
            self.circuit_breaker.record_failure().await
        };
        if let Some(t) = transition {
            self.event_bus
                .emit(Event::CircuitBreakerStateChanged(CircuitBreakerStateChanged {
                    previous_state: t.previous,
                    new_state: t.new,
                    failures: self.circuit_breaker.get_stats().await.consecutive_failures,
                    timestamp: chrono::Utc::now(),
                }));
        }
    }

    /// Steps 7-12: assemble, emit start, call upstream, emit completion,
    /// track cost, evaluate. Shared between the first attempt and the
    /// single escalation retry (step 13).
    ///
    /// `cancel` is raced against the upstream call itself: if it fires
    /// first, the call future is dropped (aborting the in-flight upstream
    /// request) and this returns `Cancelled` rather than waiting for the
    /// provider. A provider that never reported usage before being dropped
    /// has nothing to track; one that completed a moment before the race
    /// resolved still has its tokens tracked normally through the `Ok` arm.
    async fn run_attempt(
        &self,
        request: &AIRequest,
        tier: ModelTier,
        cancel: &CancellationToken,
    ) -> Result<(String, ModelTier, String, u32, u32, Microcents, u64, f64), OrchestratorError> {
        let payload = self.prompt_assembler.assemble(request);
        let estimated_tokens = payload.max_tokens;

        self.event_bus.emit(Event::RequestStart(RequestStart {
            model: tier.to_string(),
            estimated_tokens,
        }));

        let completion_request = CompletionRequest {
            tier,
            payload,
            caching_enabled: self.feature_flags.prompt_caching_enabled && request.enable_caching,
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.emit_terminal(&tier.to_string(), Some(tier), request.category, 0, 0, Microcents::ZERO, 0, false)
                    .await;
                return Err(OrchestratorError::Cancelled { stage: "upstream" });
            }
            res = self.providers.complete_with_fallback(completion_request) => res,
        };

        match result {
            Ok(priced) => {
                self.emit_terminal(
                    &priced.response.model,
                    Some(tier),
                    request.category,
                    priced.response.input_tokens,
                    priced.response.output_tokens,
                    priced.cost,
                    priced.response.duration_ms,
                    true,
                )
                .await;

                self.cost_tracker
                    .track(crate::cost_tracker::TrackUsage {
                        operation: "execute".to_string(),
                        agent: request.agent.clone(),
                        provider: priced.provider.as_str().to_string(),
                        model: priced.response.model.clone(),
                        input_tokens: priced.response.input_tokens,
                        output_tokens: priced.response.output_tokens,
                        cost: priced.cost,
                    })
                    .await;

                let quality = self
                    .response_evaluator
                    .score(&request.content, &priced.response.content);

                Ok((
                    priced.response.content,
                    tier,
                    priced.provider.as_str().to_string(),
                    priced.response.input_tokens,
                    priced.response.output_tokens,
                    priced.cost,
                    priced.response.duration_ms,
                    quality,
                ))
            }
            Err(e) => {
                self.emit_terminal(&tier.to_string(), Some(tier), request.category, 0, 0, Microcents::ZERO, 0, false)
                    .await;
                let stage = "upstream";
                if e.is_transient() {
                    Err(OrchestratorError::ProviderTransient { stage, source: e })
                } else {
                    Err(OrchestratorError::ProviderPermanent { stage, source: e })
                }
            }
        }
    }

    /// The 15-step pipeline.
    pub async fn execute(&self, request: AIRequest) -> Result<AIResponse, OrchestratorError> {
        self.execute_cancellable(request, &CancellationToken::new()).await
    }

    pub async fn execute_cancellable(
        &self,
        request: AIRequest,
        cancel: &CancellationToken,
    ) -> Result<AIResponse, OrchestratorError> {
        // Step 1: validate.
        if !self.feature_flags.orchestrator_enabled {
            return Err(OrchestratorError::InvalidRequest {
                stage: "validate",
                message: "orchestrator disabled".to_string(),
            });
        }
        if let Err(message) = request.validate() {
            self.emit_terminal("none", None, request.category, 0, 0, Microcents::ZERO, 0, false)
                .await;
            return Err(OrchestratorError::InvalidRequest {
                stage: "validate",
                message,
            });
        }

        // Step 2: classify.
        let complexity = crate::value_scorer::classify_complexity(&request.content, request.category);
        self.event_bus.emit(Event::RequestReceived(RequestReceived {
            request_id: request.request_id,
            category: request.category,
            complexity,
            agent: request.agent.clone(),
            timestamp: chrono::Utc::now(),
        }));

        let estimated_tokens = crate::model_registry::default_max_tokens(request.category);

        // Step 3: budget check.
        let decision = self.cost_tracker.can_proceed(estimated_tokens, request.priority).await;
        if !decision.allowed {
            self.emit_terminal("none", None, request.category, 0, 0, Microcents::ZERO, 0, false)
                .await;
            return Err(OrchestratorError::BudgetExceeded {
                stage: "budget",
                reason: decision.reason.unwrap_or_else(|| "budget exceeded".to_string()),
            });
        }

        // Step 4: circuit check.
        let (can_execute, transition) = self.circuit_breaker.can_execute().await;
        if let Some(t) = transition {
            self.event_bus
                .emit(Event::CircuitBreakerStateChanged(CircuitBreakerStateChanged {
                    previous_state: t.previous,
                    new_state: t.new,
                    failures: self.circuit_breaker.get_stats().await.consecutive_failures,
                    timestamp: chrono::Utc::now(),
                }));
        }
        if !can_execute {
            self.emit_terminal("none", None, request.category, 0, 0, Microcents::ZERO, 0, false)
                .await;
            return Err(OrchestratorError::CircuitOpen { stage: "circuit" });
        }

        if cancel.is_cancelled() {
            self.emit_terminal("none", None, request.category, 0, 0, Microcents::ZERO, 0, false)
                .await;
            return Err(OrchestratorError::Cancelled { stage: "pre_upstream" });
        }

        // Step 5: select model.
        let throttle_level = self.cost_tracker.throttle_level().await;
        let scoring_input = ScoringInput {
            complexity,
            category: request.category,
            security_sensitive: request.security_sensitive,
            budget_pressure: throttle_level,
            historical_performance: HashMap::new(),
            provider_health: HashMap::new(),
            available_providers: self.providers.available_providers(),
            estimated_output_tokens: estimated_tokens,
        };
        let Some(scoring) = self.value_scorer.score(&scoring_input) else {
            self.emit_terminal("none", None, request.category, 0, 0, Microcents::ZERO, 0, false)
                .await;
            return Err(OrchestratorError::NoAvailableModels {
                stage: "select_model",
                chain: "value_scorer".to_string(),
            });
        };

        let estimated_cost = self
            .model_registry
            .estimate_cost(scoring.recommended_tier, estimated_tokens, estimated_tokens);

        self.event_bus.emit(Event::ModelSelected(ModelSelected {
            request_id: request.request_id,
            model: scoring.recommended_tier.to_string(),
            value_score: scoring.score,
            reasoning: scoring.reasoning.clone(),
            estimated_cost: estimated_cost.to_dollars(),
            timestamp: chrono::Utc::now(),
        }));

        // Step 6: governance.
        let mut governance_approved = None;
        if self.feature_flags.governance_enabled {
            if let Some(governance) = &self.governance {
                if self.requires_approval(&request, estimated_cost.to_dollars()) {
                    let decision = request_approval_with_deadline(
                        governance.as_ref(),
                        &request,
                        estimated_cost.to_dollars(),
                        scoring.recommended_tier.as_str(),
                        DEFAULT_APPROVAL_DEADLINE,
                    )
                    .await;
                    governance_approved = Some(decision.approved);
                    if !decision.approved {
                        self.emit_terminal("none", None, request.category, 0, 0, Microcents::ZERO, 0, false)
                            .await;
                        return Err(OrchestratorError::GovernanceDenied {
                            stage: "governance",
                            reason: decision.reason.unwrap_or_else(|| "denied".to_string()),
                        });
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            self.emit_terminal("none", None, request.category, 0, 0, Microcents::ZERO, 0, false)
                .await;
            return Err(OrchestratorError::Cancelled { stage: "pre_upstream" });
        }

        // Steps 7-12, first attempt.
        let attempt = self.run_attempt(&request, scoring.recommended_tier, cancel).await;
        let (content, tier, provider, input_tokens, output_tokens, cost, duration_ms, quality) = match attempt {
            Ok(v) => v,
            Err(e) => {
                self.record_circuit_transition(false).await;
                return Err(e);
            }
        };

        let mut final_tier = tier;
        let mut final_provider = provider;
        let mut final_content = content;
        let mut final_input_tokens = input_tokens;
        let mut final_output_tokens = output_tokens;
        let mut final_cost = cost;
        let mut final_duration_ms = duration_ms;
        let mut final_quality = quality;
        let mut escalated = false;
        let mut escalation_reason = None;

        // Step 13: escalate at most once.
        let should_escalate = self.feature_flags.quality_escalation_enabled
            && self.response_evaluator.should_escalate(quality, complexity);

        if should_escalate {
            if let Some(higher) = self.model_registry.higher_tier(tier) {
                if self.providers.available_providers().contains(&higher.provider()) {
                    warn!(from = %tier, to = %higher, quality, "escalating due to low quality score");
                    match self.run_attempt(&request, higher, cancel).await {
                        Ok((content, tier2, provider2, in_tok, out_tok, cost2, dur2, quality2)) => {
                            escalated = true;
                            escalation_reason = Some(format!(
                                "quality {:.2} below threshold for {:?}",
                                quality, complexity
                            ));
                            final_tier = tier2;
                            final_provider = provider2;
                            final_content = content;
                            final_input_tokens = in_tok;
                            final_output_tokens = out_tok;
                            final_cost = final_cost.saturating_add(cost2);
                            final_duration_ms += dur2;
                            final_quality = quality2;
                        }
                        Err(e) => {
                            self.record_circuit_transition(false).await;
                            return Err(e);
                        }
                    }
                }
            }
        }

        self.event_bus.emit(Event::ResponseEvaluated(ResponseEvaluated {
            request_id: request.request_id,
            quality_score: final_quality,
            escalated,
            escalation_reason: escalation_reason.clone(),
            timestamp: chrono::Utc::now(),
        }));

        // Step 14: record success on the orchestrator circuit.
        self.record_circuit_transition(true).await;

        // Step 15: return.
        Ok(AIResponse {
            request_id: request.request_id,
            content: final_content,
            model: final_tier.to_string(),
            provider: final_provider,
            input_tokens: final_input_tokens,
            output_tokens: final_output_tokens,
            cost: final_cost.to_dollars(),
            duration_ms: final_duration_ms,
            cached: false,
            quality_score: final_quality,
            escalated,
            escalation_reason,
            governance_approved,
        })
    }

    /// `query(text, agent)` convenience wrapper.
    pub async fn query(&self, text: impl Into<String>, agent: impl Into<String>) -> Result<String, OrchestratorError> {
        let request = AIRequest::new(text, Category::Query, agent);
        Ok(self.execute(request).await?.content)
    }

    /// `chat(messages, systemPrompt?, agent)` convenience wrapper. The last
    /// message is treated as the current turn's content per `AIRequest`'s
    /// invariant that the trailing message is the user's.
    pub async fn chat(
        &self,
        mut messages: Vec<ConversationMessage>,
        system_prompt: Option<String>,
        agent: impl Into<String>,
    ) -> Result<String, OrchestratorError> {
        let last = messages.pop().filter(|m| m.role == ConversationRole::User);
        let content = last.map(|m| m.content).unwrap_or_default();
        let mut request = AIRequest::new(content, Category::Chat, agent);
        request.messages = messages;
        request.system_prompt = system_prompt;
        Ok(self.execute(request).await?.content)
    }

    /// `summarize(text, maxLength, agent)` convenience wrapper.
    pub async fn summarize(
        &self,
        text: impl Into<String>,
        max_length: u32,
        agent: impl Into<String>,
    ) -> Result<String, OrchestratorError> {
        let mut request = AIRequest::new(text, Category::Summarize, agent);
        request.max_tokens = Some(max_length);
        Ok(self.execute(request).await?.content)
    }

    /// `parseCommand(text, agent)` convenience wrapper. Best-effort JSON
    /// decode of the response; on parse failure returns the `unknown` sentinel
    ///.
    pub async fn parse_command(
        &self,
        text: impl Into<String>,
        agent: impl Into<String>,
    ) -> Result<ParsedCommand, OrchestratorError> {
        let text = text.into();
        let request = AIRequest::new(text.clone(), Category::ParseCommand, agent);
        let response = self.execute(request).await?;
        match serde_json::from_str::<serde_json::Value>(&response.content) {
            Ok(value) => Ok(ParsedCommand {
                intent: value
                    .get("intent")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                entities: value.get("entities").cloned().unwrap_or_else(|| serde_json::json!({})),
                confidence: value.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0),
                raw: response.content,
            }),
            Err(_) => Ok(ParsedCommand::unknown(text)),
        }
    }

    pub async fn get_status(&self) -> OrchestratorStatus {
        let metrics = self.metrics.lock().await;
        let average_latency_ms = if metrics.latency_samples > 0 {
            metrics.total_latency_ms as f64 / metrics.latency_samples as f64
        } else {
            0.0
        };
        OrchestratorStatus {
            orchestrator_enabled: self.feature_flags.orchestrator_enabled,
            circuit_breaker_state: self.circuit_breaker.get_state().await,
            total_requests: metrics.total_requests,
            total_errors: metrics.total_errors,
            total_cost: metrics.total_cost.to_dollars(),
            average_latency_ms,
            model_usage: metrics.model_usage.clone(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    /// True iff at least one provider connects.
    pub async fn test_connection(&self) -> bool {
        self.providers
            .test_all_providers()
            .await
            .values()
            .any(|r| r.connected)
    }

    /// Drains providers' connection pools. Failures are collected, not
    /// propagated, matching `ProviderRegistry::shutdown_all`'s isolation
    /// guarantee.
    pub async fn shutdown(&self) {
        info!("orchestrator shutting down");
        self.cost_tracker.shutdown().await;
        let failures = self.providers.shutdown_all().await;
        for (id, err) in failures {
            warn!(provider = ?id, error = %err, "provider shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventBus;
    use crate::governance::{AutoApproveGovernance, AutoDenyGovernance};
    use crate::model_registry::ProviderId;
    use crate::models::FinishReason;
    use crate::providers::{
        CompletionResponse, ConnectionTestResult, LLMProvider, ProviderHealth, StreamResult,
    };
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    struct StubProvider {
        id: ProviderId,
        tiers: Vec<ModelTier>,
        response_text: String,
        fails: AtomicU32,
        /// Artificial delay before `complete` resolves, so tests can race a
        /// cancellation against an in-flight call.
        delay_ms: u64,
    }

    #[async_trait]
    impl LLMProvider for StubProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn priority(&self) -> u32 {
            50
        }

        async fn complete(
            &self,
            req: CompletionRequest,
        ) -> Result<CompletionResponse, crate::error::ProviderError> {
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            if self.fails.load(Ordering::SeqCst) > 0 {
                self.fails.fetch_sub(1, Ordering::SeqCst);
                return Err(crate::error::ProviderError::ServiceUnavailable);
            }
            Ok(CompletionResponse {
                content: self.response_text.clone(),
                model: req.tier.to_string(),
                input_tokens: 20,
                output_tokens: 10,
                cached_input_tokens: 0,
                cache_write_tokens: 0,
                duration_ms: 5,
                finish_reason: FinishReason::Stop,
            })
        }

        async fn stream(&self, _req: CompletionRequest) -> Result<StreamResult, crate::error::ProviderError> {
            Err(crate::error::ProviderError::FeatureNotSupported {
                feature: "stream".into(),
            })
        }

        async fn test_connection(&self) -> ConnectionTestResult {
            ConnectionTestResult {
                connected: true,
                latency_ms: 1,
                error: None,
            }
        }

        fn list_models(&self) -> Vec<ModelTier> {
            self.tiers.clone()
        }

        fn supports_caching(&self) -> bool {
            false
        }

        fn get_health_status(&self) -> ProviderHealth {
            ProviderHealth {
                status: crate::providers::HealthStatus::Healthy,
                last_check_at: chrono::Utc::now(),
                last_success_at: Some(chrono::Utc::now()),
                latency_ms: Some(1),
                consecutive_failures: 0,
                circuit_breaker_state: crate::providers::ProviderCircuitMirror::Closed,
            }
        }

        async fn shutdown(&self) -> Result<(), crate::error::ProviderError> {
            Ok(())
        }
    }

    fn orchestrator_with(response_text: &str, fails: u32) -> Orchestrator {
        orchestrator_with_delay(response_text, fails, 0)
    }

    fn orchestrator_with_delay(response_text: &str, fails: u32, delay_ms: u64) -> Orchestrator {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider {
            id: ProviderId::Anthropic,
            tiers: vec![ModelTier::ClaudeHaiku45, ModelTier::ClaudeSonnet45, ModelTier::ClaudeOpus45, ModelTier::ClaudeOpus46],
            response_text: response_text.to_string(),
            fails: AtomicU32::new(fails),
            delay_ms,
        }));
        Orchestrator::new(
            Arc::new(NullEventBus),
            Arc::new(registry),
            crate::cost_tracker::InMemoryCostTracker::new(Microcents::from_dollars(1000.0)),
            None,
            FeatureFlags::default(),
        )
    }

    #[tokio::test]
    async fn empty_content_is_rejected_before_upstream() {
        let orchestrator = orchestrator_with("hello", 0);
        let request = AIRequest::new("", Category::Chat, "agent-1");
        let err = orchestrator.execute(request).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn successful_execute_returns_response_with_quality_score() {
        let orchestrator = orchestrator_with("Here is the answer: 4.", 0);
        let request = AIRequest::new("What is 2+2?", Category::Query, "agent-1");
        let response = orchestrator.execute(request).await.unwrap();
        assert!(!response.escalated);
        assert!(response.quality_score > 0.5);
        assert!(response.cost >= 0.0);
    }

    #[tokio::test]
    async fn low_quality_response_triggers_one_escalation() {
        let orchestrator = orchestrator_with("I'm not sure, it's unclear to me what you mean.", 0);
        let request = AIRequest::new(
            "Design a distributed rate limiter with multiple tiers and edge cases to consider carefully.",
            Category::Planning,
            "agent-1",
        );
        let response = orchestrator.execute(request).await.unwrap();
        assert!(response.escalated);
        assert_eq!(response.model, ModelTier::ClaudeOpus45.to_string());
    }

    #[tokio::test]
    async fn budget_pause_blocks_standard_priority_requests() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider {
            id: ProviderId::Anthropic,
            tiers: vec![ModelTier::ClaudeHaiku45],
            response_text: "ok".to_string(),
            fails: AtomicU32::new(0),
        }));
        let tracker = crate::cost_tracker::InMemoryCostTracker::new(Microcents(1));
        tracker
            .track(crate::cost_tracker::TrackUsage {
                operation: "seed".into(),
                agent: "a".into(),
                provider: "p".into(),
                model: "m".into(),
                input_tokens: 0,
                output_tokens: 0,
                cost: Microcents(1),
            })
            .await;
        let orchestrator = Orchestrator::new(
            Arc::new(NullEventBus),
            Arc::new(registry),
            tracker,
            None,
            FeatureFlags::default(),
        );
        let request = AIRequest::new("hi", Category::Chat, "agent-1");
        let err = orchestrator.execute(request).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::BudgetExceeded { .. }));
    }

    #[tokio::test]
    async fn governance_denial_short_circuits_before_upstream() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider {
            id: ProviderId::Anthropic,
            tiers: vec![ModelTier::ClaudeHaiku45, ModelTier::ClaudeSonnet45, ModelTier::ClaudeOpus45, ModelTier::ClaudeOpus46],
            response_text: "ok".to_string(),
            fails: AtomicU32::new(0),
        }));
        let mut flags = FeatureFlags::default();
        flags.governance_enabled = true;
        let orchestrator = Orchestrator::new(
            Arc::new(NullEventBus),
            Arc::new(registry),
            crate::cost_tracker::InMemoryCostTracker::new(Microcents::from_dollars(1000.0)),
            Some(Arc::new(AutoDenyGovernance)),
            flags,
        );
        let request = AIRequest::new("fix the auth flow", Category::Security, "agent-1");
        let err = orchestrator.execute(request).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::GovernanceDenied { .. }));
    }

    #[tokio::test]
    async fn governance_approval_allows_execution_to_proceed() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider {
            id: ProviderId::Anthropic,
            tiers: vec![ModelTier::ClaudeHaiku45, ModelTier::ClaudeSonnet45, ModelTier::ClaudeOpus45, ModelTier::ClaudeOpus46],
            response_text: "Here is the answer: done.".to_string(),
            fails: AtomicU32::new(0),
        }));
        let mut flags = FeatureFlags::default();
        flags.governance_enabled = true;
        let orchestrator = Orchestrator::new(
            Arc::new(NullEventBus),
            Arc::new(registry),
            crate::cost_tracker::InMemoryCostTracker::new(Microcents::from_dollars(1000.0)),
            Some(Arc::new(AutoApproveGovernance)),
            flags,
        );
        let request = AIRequest::new("fix the auth flow", Category::Security, "agent-1");
        let response = orchestrator.execute(request).await.unwrap();
        assert_eq!(response.governance_approved, Some(true));
    }

    #[tokio::test]
    async fn circuit_opens_after_repeated_upstream_failures() {
        let orchestrator = orchestrator_with("ok", 10);
        for _ in 0..5 {
            let request = AIRequest::new("hi", Category::Chat, "agent-1");
            let _ = orchestrator.execute(request).await;
        }
        let request = AIRequest::new("hi", Category::Chat, "agent-1");
        let err = orchestrator.execute(request).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::CircuitOpen { .. }));
    }

    /// Cancelling mid-flight (step 9) must abort the upstream call and
    /// still return `Cancelled`, rather than waiting for the slow provider
    /// to resolve.
    #[tokio::test]
    async fn cancelling_during_the_upstream_call_aborts_it() {
        let orchestrator = orchestrator_with_delay("ok", 0, 200);
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let request = AIRequest::new("hi", Category::Chat, "agent-1");
        let started = Instant::now();
        let err = orchestrator
            .execute_cancellable(request, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Cancelled { .. }));
        assert!(started.elapsed() < std::time::Duration::from_millis(200));
    }

    #[tokio::test]
    async fn parse_command_falls_back_to_unknown_on_invalid_json() {
        let orchestrator = orchestrator_with("not json at all", 0);
        let parsed = orchestrator.parse_command("do the thing", "agent-1").await.unwrap();
        assert_eq!(parsed.intent, "unknown");
        assert_eq!(parsed.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_connection_true_when_a_provider_connects() {
        let orchestrator = orchestrator_with("ok", 0);
        assert!(orchestrator.test_connection().await);
    }

    #[tokio::test]
    async fn get_status_reflects_request_and_error_counts() {
        let orchestrator = orchestrator_with("Here is the answer: done.", 0);
        let request = AIRequest::new("hi", Category::Chat, "agent-1");
        orchestrator.execute(request).await.unwrap();
        let status = orchestrator.get_status().await;
        assert_eq!(status.total_requests, 1);
        assert_eq!(status.total_errors, 0);
    }
}
