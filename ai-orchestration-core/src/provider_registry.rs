//! # ProviderRegistry
//!
//! Owns the set of configured `LLMProvider`s and routes a `ModelTier` to the
//! provider that serves it. Cost is computed here rather than
//! in the providers themselves: providers return raw token counts,
//! `ProviderRegistry` turns those into `Microcents` via `ModelRegistry`, the
//! one place prices live.

use crate::common::Microcents;
use crate::error::ProviderError;
use crate::model_registry::{ModelRegistry, ModelTier, ProviderId};
use crate::providers::{CompletionRequest, CompletionResponse, ConnectionTestResult, LLMProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A completion result enriched with the dollar cost `ModelRegistry` computed
/// from the provider's reported token split.
#[derive(Debug, Clone)]
pub struct PricedCompletion {
    pub response: CompletionResponse,
    pub cost: Microcents,
    pub provider: ProviderId,
}

/// Registers configured providers and routes by tier. Construction is
/// infallible; `register` simply records whatever providers the caller
/// already built.
///
/// More than one provider can claim the same `ModelTier` (spec §4.3's
/// same-model fallback scenario: two providers both serving an aliased
/// model). `providers` is kept as the id-keyed lookup `available_providers`,
/// `test_all_providers` and `shutdown_all` need; `by_tier` is a derived
/// index, rebuilt on every `register`, of the providers that support each
/// tier, sorted by declared `priority()` descending so the first entry is
/// always the primary.
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Arc<dyn LLMProvider>>,
    by_tier: HashMap<ModelTier, Vec<Arc<dyn LLMProvider>>>,
    registry: ModelRegistry,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            by_tier: HashMap::new(),
            registry: ModelRegistry::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LLMProvider>) {
        for tier in provider.list_models() {
            let slot = self.by_tier.entry(tier).or_default();
            slot.push(provider.clone());
            slot.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        }
        self.providers.insert(provider.id(), provider);
    }

    pub fn available_providers(&self) -> Vec<ProviderId> {
        self.providers.keys().copied().collect()
    }

    /// Every provider that serves `tier`, highest `priority()` first.
    pub fn providers_for_model(&self, tier: ModelTier) -> &[Arc<dyn LLMProvider>] {
        self.by_tier.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Looks up the primary (highest-priority) provider that serves `tier`.
    pub fn provider_for_model(&self, tier: ModelTier) -> Result<&Arc<dyn LLMProvider>, ProviderError> {
        self.providers_for_model(tier)
            .first()
            .ok_or_else(|| ProviderError::ModelNotFound {
                model: tier.to_string(),
            })
    }

    fn price(&self, tier: ModelTier, resp: &CompletionResponse) -> Microcents {
        self.registry.estimate_cost_detailed(
            tier,
            resp.input_tokens,
            resp.cached_input_tokens,
            resp.cache_write_tokens,
            resp.output_tokens,
        )
    }

    /// Routes a request to the primary provider that serves its tier, no
    /// fallback.
    pub async fn complete(&self, req: CompletionRequest) -> Result<PricedCompletion, ProviderError> {
        let tier = req.tier;
        let provider = self.provider_for_model(tier)?;
        let response = provider.complete(req).await?;
        let cost = self.price(tier, &response);
        Ok(PricedCompletion {
            cost,
            provider: provider.id(),
            response,
        })
    }

    /// Tries the primary provider for `req.tier`, then every other provider
    /// that also supports the tier in declared-priority order, stopping at
    /// the first success (spec §4.3's same-model fallback: Anthropic fails
    /// three times on a tier both it and OpenAI serve, OpenAI succeeds
    /// next). A transient failure moves to the next provider; a permanent
    /// failure is returned immediately since retrying elsewhere cannot fix
    /// an invalid request or bad credentials.
    pub async fn complete_with_fallback(
        &self,
        req: CompletionRequest,
    ) -> Result<PricedCompletion, ProviderError> {
        let tier = req.tier;
        let candidates = self.providers_for_model(tier);
        if candidates.is_empty() {
            return Err(ProviderError::ModelNotFound {
                model: tier.to_string(),
            });
        }

        let mut last_err: Option<ProviderError> = None;
        for provider in candidates {
            match provider.complete(req.clone()).await {
                Ok(response) => {
                    let cost = self.price(tier, &response);
                    return Ok(PricedCompletion {
                        cost,
                        provider: provider.id(),
                        response,
                    });
                }
                Err(e) if e.is_transient() => {
                    warn!(tier = %tier, provider = ?provider.id(), error = %e, "transient provider failure, trying next provider");
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(ProviderError::ServiceUnavailable))
    }

    /// Runs every registered provider's connection probe concurrently and
    /// returns every result, successes and failures alike.
    pub async fn test_all_providers(&self) -> HashMap<ProviderId, ConnectionTestResult> {
        let mut results = HashMap::new();
        for (id, provider) in &self.providers {
            results.insert(*id, provider.test_connection().await);
        }
        results
    }

    /// Shuts down every provider, collecting failures rather than stopping
    /// at the first one so one
    /// misbehaving provider never blocks the others from releasing their
    /// connection pools.
    pub async fn shutdown_all(&self) -> Vec<(ProviderId, ProviderError)> {
        let mut failures = Vec::new();
        for (id, provider) in &self.providers {
            if let Err(e) = provider.shutdown().await {
                failures.push((*id, e));
            } else {
                debug!(provider = ?id, "provider shut down");
            }
        }
        failures
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_registry::ModelTier;
    use crate::models::{ConversationMessage, ConversationRole, FinishReason};
    use crate::providers::{PromptPayload, StreamResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        id: ProviderId,
        priority: u32,
        tiers: Vec<ModelTier>,
        fail_times: AtomicU32,
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        async fn complete(
            &self,
            req: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(ProviderError::ServiceUnavailable);
            }
            Ok(CompletionResponse {
                content: "ok".into(),
                model: req.tier.to_string(),
                input_tokens: 10,
                output_tokens: 5,
                cached_input_tokens: 0,
                cache_write_tokens: 0,
                duration_ms: 1,
                finish_reason: FinishReason::Stop,
            })
        }

        async fn stream(&self, _req: CompletionRequest) -> Result<StreamResult, ProviderError> {
            Err(ProviderError::FeatureNotSupported {
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

        fn get_health_status(&self) -> crate::providers::ProviderHealth {
            crate::providers::ProviderHealth {
                status: crate::providers::HealthStatus::Healthy,
                last_check_at: chrono::Utc::now(),
                last_success_at: Some(chrono::Utc::now()),
                latency_ms: Some(1),
                consecutive_failures: 0,
                circuit_breaker_state: crate::providers::ProviderCircuitMirror::Closed,
            }
        }

        async fn shutdown(&self) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn sample_request(tier: ModelTier) -> CompletionRequest {
        CompletionRequest {
            tier,
            payload: PromptPayload {
                system: vec![],
                messages: vec![ConversationMessage {
                    role: ConversationRole::User,
                    content: "hi".into(),
                }],
                max_tokens: 100,
            },
            caching_enabled: false,
        }
    }

    #[tokio::test]
    async fn complete_routes_to_the_registered_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FlakyProvider {
            id: ProviderId::Anthropic,
            priority: 50,
            tiers: vec![ModelTier::ClaudeHaiku45],
            fail_times: AtomicU32::new(0),
        }));

        let result = registry
            .complete(sample_request(ModelTier::ClaudeHaiku45))
            .await
            .unwrap();
        assert_eq!(result.provider, ProviderId::Anthropic);
        assert!(result.cost > Microcents::ZERO);
    }

    #[tokio::test]
    async fn unknown_tier_returns_model_not_found() {
        let registry = ProviderRegistry::new();
        let err = registry
            .complete(sample_request(ModelTier::ClaudeHaiku45))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ModelNotFound { .. }));
    }

    /// Spec §4.3 / scenario S4: two providers both claim the same tier.
    /// The higher-priority one (Anthropic) fails transiently three times;
    /// `complete_with_fallback` must move on to the next provider that
    /// supports the same model (OpenAI) rather than giving up.
    #[tokio::test]
    async fn fallback_tries_the_next_provider_for_the_same_model() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FlakyProvider {
            id: ProviderId::Anthropic,
            priority: 50,
            tiers: vec![ModelTier::ClaudeHaiku45],
            fail_times: AtomicU32::new(3),
        }));
        registry.register(Arc::new(FlakyProvider {
            id: ProviderId::OpenAI,
            priority: 40,
            tiers: vec![ModelTier::ClaudeHaiku45],
            fail_times: AtomicU32::new(0),
        }));

        // The primary (highest-priority) provider for the tier is tried
        // first and is the one left with exhausted failures.
        assert_eq!(
            registry.provider_for_model(ModelTier::ClaudeHaiku45).unwrap().id(),
            ProviderId::Anthropic
        );

        let result = registry
            .complete_with_fallback(sample_request(ModelTier::ClaudeHaiku45))
            .await
            .unwrap();
        assert_eq!(result.provider, ProviderId::OpenAI);
    }

    #[tokio::test]
    async fn fallback_with_no_provider_for_the_model_errors() {
        let registry = ProviderRegistry::new();
        let err = registry
            .complete_with_fallback(sample_request(ModelTier::ClaudeHaiku45))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ModelNotFound { .. }));
    }
}
