//! # CascadeRouter
//!
//! An alternative top-level execution mode for callers who prefer explicit
//! cheap-first traversal over `ValueScorer`'s single-shot selection.
//! Predefined chains are data, not code: a `HashMap<&str, CascadeChain>`
//! built once at construction, not a hardcoded match per chain name.

use crate::common::Microcents;
use crate::error::OrchestratorError;
use crate::events::{CascadeComplete, CascadeStarted, CascadeStepComplete, Event, EventBus};
use crate::model_registry::ModelTier;
use crate::models::Complexity;
use crate::provider_registry::ProviderRegistry;
use crate::providers::{CompletionRequest, PromptPayload};
use crate::response_evaluator::ResponseEvaluator;
use std::collections::HashMap;
use std::time::Instant;

/// One step of a chain: try `model`, accept if quality >= `threshold` (the
/// last step's threshold is implicitly 0, enforced by the traversal loop
/// rather than stored on the step).
#[derive(Debug, Clone, Copy)]
pub struct CascadeStep {
    pub model: ModelTier,
    pub threshold: f64,
}

#[derive(Debug, Clone)]
pub struct CascadeChain {
    pub name: &'static str,
    pub steps: Vec<CascadeStep>,
}

fn step(model: ModelTier, threshold: f64) -> CascadeStep {
    CascadeStep { model, threshold }
}

/// Predefined chains, cheap-to-expensive. The `frugal` chain deliberately
/// spans three providers (Google, then two Anthropic tiers): unavailable
/// providers are silently skipped by the traversal algorithm's filtering
/// step, not an error at construction time.
fn predefined_chains() -> HashMap<&'static str, CascadeChain> {
    use ModelTier::*;
    let mut chains = HashMap::new();

    chains.insert(
        "frugal",
        CascadeChain {
            name: "frugal",
            steps: vec![step(GeminiFlashLite25, 0.7), step(ClaudeHaiku45, 0.5), step(ClaudeSonnet45, 0.0)],
        },
    );
    chains.insert(
        "bulk",
        CascadeChain {
            name: "bulk",
            steps: vec![step(Gpt41Nano, 0.6), step(GeminiFlashLite25, 0.0)],
        },
    );
    chains.insert(
        "balanced",
        CascadeChain {
            name: "balanced",
            steps: vec![step(ClaudeHaiku45, 0.65), step(ClaudeSonnet45, 0.5), step(ClaudeOpus45, 0.0)],
        },
    );
    chains.insert(
        "code",
        CascadeChain {
            name: "code",
            steps: vec![step(ClaudeSonnet45, 0.6), step(ClaudeOpus45, 0.5), step(ClaudeOpus46, 0.0)],
        },
    );
    chains.insert(
        "reasoning",
        CascadeChain {
            name: "reasoning",
            steps: vec![step(Gpt41Mini, 0.6), step(O3, 0.5), step(ClaudeOpus46, 0.0)],
        },
    );
    chains.insert(
        "security",
        CascadeChain {
            name: "security",
            steps: vec![step(ClaudeSonnet45, 0.7), step(ClaudeOpus45, 0.6), step(ClaudeOpus46, 0.0)],
        },
    );
    chains.insert(
        "quality",
        CascadeChain {
            name: "quality",
            steps: vec![step(ClaudeOpus45, 0.8), step(ClaudeOpus46, 0.0)],
        },
    );

    chains
}

pub struct CascadeRunOutcome {
    pub content: String,
    pub model: ModelTier,
    pub quality: f64,
    pub escalated: bool,
    pub total_cost: Microcents,
    pub steps_attempted: usize,
}

pub struct CascadeRouter {
    chains: HashMap<&'static str, CascadeChain>,
    evaluator: ResponseEvaluator,
}

impl CascadeRouter {
    pub fn new() -> Self {
        Self {
            chains: predefined_chains(),
            evaluator: ResponseEvaluator::new(),
        }
    }

    pub fn chain(&self, name: &str) -> Option<&CascadeChain> {
        self.chains.get(name)
    }

    /// Picks a named chain for `(category, securitySensitive, complexity)`.
    pub fn select_chain(
        &self,
        category: crate::models::Category,
        security_sensitive: bool,
        complexity: Complexity,
    ) -> &'static str {
        use crate::models::Category::*;

        if security_sensitive {
            return "security";
        }

        let by_category = match category {
            CodeGeneration | CodeReview => Some("code"),
            Security => Some("security"),
            Planning => Some("reasoning"),
            Analysis => Some("balanced"),
            Chat | Query => Some("frugal"),
            Summarize | ParseCommand | Heartbeat => Some("bulk"),
        };

        if complexity == Complexity::Critical {
            return "quality";
        }
        if complexity == Complexity::Complex && by_category.is_none() {
            return "balanced";
        }

        by_category.unwrap_or("balanced")
    }

    /// Runs the cascade traversal algorithm against one
    /// chain. `payload_for` builds the provider-neutral payload for a given
    /// tier — callers typically close over a fixed `PromptAssembler` output
    /// and reuse it across steps, since the message content doesn't change
    /// between tiers.
    pub async fn run(
        &self,
        chain_name: &str,
        registry: &ProviderRegistry,
        query_for_quality: &str,
        payload: &PromptPayload,
        caching_enabled: bool,
        bus: &dyn EventBus,
    ) -> Result<CascadeRunOutcome, OrchestratorError> {
        let chain = self
            .chains
            .get(chain_name)
            .ok_or_else(|| OrchestratorError::NoAvailableModels {
                stage: "cascade",
                chain: chain_name.to_string(),
            })?;

        let available_providers = registry.available_providers();
        let available_steps: Vec<&CascadeStep> = chain
            .steps
            .iter()
            .filter(|s| available_providers.contains(&s.model.provider()))
            .collect();

        if available_steps.is_empty() {
            return Err(OrchestratorError::NoAvailableModels {
                stage: "cascade",
                chain: chain_name.to_string(),
            });
        }

        bus.emit(Event::CascadeStarted(CascadeStarted {
            chain: chain_name.to_string(),
            query_length: query_for_quality.len(),
        }));

        let start = Instant::now();
        let mut total_cost = Microcents::ZERO;
        let last_index = available_steps.len() - 1;
        let mut last_err = None;

        for (i, cascade_step) in available_steps.iter().enumerate() {
            let req = CompletionRequest {
                tier: cascade_step.model,
                payload: payload.clone(),
                caching_enabled,
            };

            let priced = match registry.complete(req).await {
                Ok(p) => p,
                Err(e) => {
                    last_err = Some(e);
                    if i == last_index {
                        return Err(OrchestratorError::ProviderTransient {
                            stage: "cascade",
                            source: last_err.unwrap(),
                        });
                    }
                    bus.emit(Event::CascadeStepComplete(CascadeStepComplete {
                        chain: chain_name.to_string(),
                        step: i,
                        model: cascade_step.model.to_string(),
                        quality: 0.0,
                        escalated: true,
                        cost_cents: 0.0,
                    }));
                    continue;
                }
            };

            total_cost = total_cost.saturating_add(priced.cost);

            let quality = if i == last_index {
                1.0
            } else {
                self.evaluator.score(query_for_quality, &priced.response.content)
            };

            let accept = i == last_index || quality >= cascade_step.threshold;

            bus.emit(Event::CascadeStepComplete(CascadeStepComplete {
                chain: chain_name.to_string(),
                step: i,
                model: cascade_step.model.to_string(),
                quality,
                escalated: !accept,
                cost_cents: priced.cost.to_dollars() * 100.0,
            }));

            if accept {
                let duration_ms = start.elapsed().as_millis() as u64;
                bus.emit(Event::CascadeComplete(CascadeComplete {
                    chain: chain_name.to_string(),
                    final_model: cascade_step.model.to_string(),
                    total_steps: i + 1,
                    total_cost_cents: total_cost.to_dollars() * 100.0,
                    duration_ms,
                }));
                return Ok(CascadeRunOutcome {
                    content: priced.response.content,
                    model: cascade_step.model,
                    quality,
                    escalated: i > 0,
                    total_cost,
                    steps_attempted: i + 1,
                });
            }
        }

        unreachable!("last step always accepts unconditionally")
    }
}

impl Default for CascadeRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[test]
    fn security_sensitive_always_selects_security_chain() {
        let router = CascadeRouter::new();
        assert_eq!(
            router.select_chain(Category::Chat, true, Complexity::Trivial),
            "security"
        );
    }

    #[test]
    fn category_table_maps_to_expected_chains() {
        let router = CascadeRouter::new();
        assert_eq!(router.select_chain(Category::CodeGeneration, false, Complexity::Standard), "code");
        assert_eq!(router.select_chain(Category::Planning, false, Complexity::Standard), "reasoning");
        assert_eq!(router.select_chain(Category::Chat, false, Complexity::Standard), "frugal");
        assert_eq!(router.select_chain(Category::Heartbeat, false, Complexity::Standard), "bulk");
    }

    #[test]
    fn critical_complexity_overrides_category() {
        let router = CascadeRouter::new();
        assert_eq!(router.select_chain(Category::Chat, false, Complexity::Critical), "quality");
    }

    #[test]
    fn predefined_chains_are_all_registered() {
        let router = CascadeRouter::new();
        for name in ["frugal", "bulk", "balanced", "code", "reasoning", "security", "quality"] {
            assert!(router.chain(name).is_some(), "missing chain: {name}");
        }
    }

    #[test]
    fn last_step_of_every_chain_has_zero_threshold() {
        let router = CascadeRouter::new();
        for name in ["frugal", "bulk", "balanced", "code", "reasoning", "security", "quality"] {
            let chain = router.chain(name).unwrap();
            assert_eq!(chain.steps.last().unwrap().threshold, 0.0);
        }
    }
}
