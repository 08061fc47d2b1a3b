//! # ModelRegistry
//!
//! Static catalog of every model tier this engine knows how to route to:
//! upstream id, per-million-token prices, context window, capability flags,
//! and a rank used to order escalation within a model family. Construction
//! reads no I/O and the catalog never changes after `ModelRegistry::new()`
//! returns, so every method here is a pure function over `&self`.

use crate::common::Microcents;
use crate::models::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The supplier of a `ModelTier`. Distinct from "tier" per the glossary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Anthropic,
    OpenAI,
    Google,
    Xai,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "anthropic",
            ProviderId::OpenAI => "openai",
            ProviderId::Google => "google",
            ProviderId::Xai => "xai",
        }
    }
}

/// Closed catalog of model tiers. Two distinct Opus generations are kept as
/// separate, ordered tiers in the same family rather than aliased together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelTier {
    ClaudeHaiku45,
    ClaudeSonnet45,
    ClaudeOpus45,
    ClaudeOpus46,
    Gpt41Nano,
    Gpt41Mini,
    Gpt41,
    O3,
    GeminiFlashLite25,
    GeminiFlash25,
    GeminiPro25,
    Grok4Fast,
    Grok4,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::ClaudeHaiku45 => "claude-haiku-4.5",
            ModelTier::ClaudeSonnet45 => "claude-sonnet-4.5",
            ModelTier::ClaudeOpus45 => "claude-opus-4.5",
            ModelTier::ClaudeOpus46 => "claude-opus-4.6",
            ModelTier::Gpt41Nano => "gpt-4.1-nano",
            ModelTier::Gpt41Mini => "gpt-4.1-mini",
            ModelTier::Gpt41 => "gpt-4.1",
            ModelTier::O3 => "o3",
            ModelTier::GeminiFlashLite25 => "gemini-2.5-flash-lite",
            ModelTier::GeminiFlash25 => "gemini-2.5-flash",
            ModelTier::GeminiPro25 => "gemini-2.5-pro",
            ModelTier::Grok4Fast => "grok-4-fast",
            ModelTier::Grok4 => "grok-4",
        }
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            ModelTier::ClaudeHaiku45
            | ModelTier::ClaudeSonnet45
            | ModelTier::ClaudeOpus45
            | ModelTier::ClaudeOpus46 => ProviderId::Anthropic,
            ModelTier::Gpt41Nano | ModelTier::Gpt41Mini | ModelTier::Gpt41 | ModelTier::O3 => {
                ProviderId::OpenAI
            }
            ModelTier::GeminiFlashLite25 | ModelTier::GeminiFlash25 | ModelTier::GeminiPro25 => {
                ProviderId::Google
            }
            ModelTier::Grok4Fast | ModelTier::Grok4 => ProviderId::Xai,
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{tools, vision, json_mode, caching, reasoning}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub tools: bool,
    pub vision: bool,
    pub json_mode: bool,
    pub caching: bool,
    pub reasoning: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ModelTierSpec {
    pub tier: ModelTier,
    pub upstream_id: &'static str,
    /// Price per million input tokens, uncached.
    pub input_price: Microcents,
    pub output_price: Microcents,
    /// Invariant: `cached_input_price <= input_price`.
    pub cached_input_price: Microcents,
    /// `cache_write_price >= input_price`, except providers whose writes are
    /// free (recorded as `Microcents::ZERO`).
    pub cache_write_price: Microcents,
    pub context_window: u32,
    pub capabilities: Capabilities,
    /// Total order within `family`; escalation only traverses ranks upward.
    /// Undefined (not compared) across families.
    pub rank: u8,
    pub family: &'static str,
}

fn usd_per_million(dollars: f64) -> Microcents {
    Microcents::from_dollars(dollars)
}

fn catalog() -> Vec<ModelTierSpec> {
    use ModelTier::*;
    vec![
        ModelTierSpec {
            tier: ClaudeHaiku45,
            upstream_id: "claude-haiku-4-5",
            input_price: usd_per_million(1.0),
            output_price: usd_per_million(5.0),
            cached_input_price: usd_per_million(0.1),
            cache_write_price: usd_per_million(1.25),
            context_window: 200_000,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: false,
            },
            rank: 0,
            family: "claude",
        },
        ModelTierSpec {
            tier: ClaudeSonnet45,
            upstream_id: "claude-sonnet-4-5",
            input_price: usd_per_million(3.0),
            output_price: usd_per_million(15.0),
            cached_input_price: usd_per_million(0.3),
            cache_write_price: usd_per_million(3.75),
            context_window: 200_000,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: true,
            },
            rank: 1,
            family: "claude",
        },
        ModelTierSpec {
            tier: ClaudeOpus45,
            upstream_id: "claude-opus-4-5",
            input_price: usd_per_million(15.0),
            output_price: usd_per_million(75.0),
            cached_input_price: usd_per_million(1.5),
            cache_write_price: usd_per_million(18.75),
            context_window: 200_000,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: true,
            },
            rank: 2,
            family: "claude",
        },
        ModelTierSpec {
            tier: ClaudeOpus46,
            upstream_id: "claude-opus-4-6",
            input_price: usd_per_million(18.0),
            output_price: usd_per_million(90.0),
            cached_input_price: usd_per_million(1.8),
            cache_write_price: usd_per_million(22.5),
            context_window: 200_000,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: true,
            },
            rank: 3,
            family: "claude",
        },
        ModelTierSpec {
            tier: Gpt41Nano,
            upstream_id: "gpt-4.1-nano",
            input_price: usd_per_million(0.1),
            output_price: usd_per_million(0.4),
            cached_input_price: usd_per_million(0.05),
            cache_write_price: Microcents::ZERO,
            context_window: 1_047_576,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: false,
            },
            rank: 0,
            family: "gpt",
        },
        ModelTierSpec {
            tier: Gpt41Mini,
            upstream_id: "gpt-4.1-mini",
            input_price: usd_per_million(0.4),
            output_price: usd_per_million(1.6),
            cached_input_price: usd_per_million(0.2),
            cache_write_price: Microcents::ZERO,
            context_window: 1_047_576,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: false,
            },
            rank: 1,
            family: "gpt",
        },
        ModelTierSpec {
            tier: Gpt41,
            upstream_id: "gpt-4.1",
            input_price: usd_per_million(2.0),
            output_price: usd_per_million(8.0),
            cached_input_price: usd_per_million(1.0),
            cache_write_price: Microcents::ZERO,
            context_window: 1_047_576,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: false,
            },
            rank: 2,
            family: "gpt",
        },
        ModelTierSpec {
            tier: O3,
            upstream_id: "o3",
            input_price: usd_per_million(10.0),
            output_price: usd_per_million(40.0),
            cached_input_price: usd_per_million(2.5),
            cache_write_price: Microcents::ZERO,
            context_window: 200_000,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: true,
            },
            rank: 3,
            family: "gpt",
        },
        ModelTierSpec {
            tier: GeminiFlashLite25,
            upstream_id: "gemini-2.5-flash-lite",
            input_price: usd_per_million(0.1),
            output_price: usd_per_million(0.4),
            cached_input_price: usd_per_million(0.025),
            cache_write_price: Microcents::ZERO,
            context_window: 1_048_576,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: false,
            },
            rank: 0,
            family: "gemini",
        },
        ModelTierSpec {
            tier: GeminiFlash25,
            upstream_id: "gemini-2.5-flash",
            input_price: usd_per_million(0.3),
            output_price: usd_per_million(2.5),
            cached_input_price: usd_per_million(0.075),
            cache_write_price: Microcents::ZERO,
            context_window: 1_048_576,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: true,
            },
            rank: 1,
            family: "gemini",
        },
        ModelTierSpec {
            tier: GeminiPro25,
            upstream_id: "gemini-2.5-pro",
            input_price: usd_per_million(1.25),
            output_price: usd_per_million(10.0),
            cached_input_price: usd_per_million(0.3125),
            cache_write_price: Microcents::ZERO,
            context_window: 1_048_576,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: true,
            },
            rank: 2,
            family: "gemini",
        },
        ModelTierSpec {
            tier: Grok4Fast,
            upstream_id: "grok-4-fast",
            input_price: usd_per_million(0.2),
            output_price: usd_per_million(0.5),
            cached_input_price: usd_per_million(0.05),
            cache_write_price: Microcents::ZERO,
            context_window: 2_000_000,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: false,
            },
            rank: 0,
            family: "grok",
        },
        ModelTierSpec {
            tier: Grok4,
            upstream_id: "grok-4",
            input_price: usd_per_million(3.0),
            output_price: usd_per_million(15.0),
            cached_input_price: usd_per_million(0.75),
            cache_write_price: Microcents::ZERO,
            context_window: 256_000,
            capabilities: Capabilities {
                tools: true,
                vision: true,
                json_mode: true,
                caching: true,
                reasoning: true,
            },
            rank: 1,
            family: "grok",
        },
    ]
}

/// Category → default `maxTokens`, also used by `ModelRegistry::estimateCost`
/// callers that don't have an explicit output-token estimate.
pub fn default_max_tokens(category: Category) -> u32 {
    match category {
        Category::Heartbeat | Category::ParseCommand => 200,
        Category::Summarize | Category::Query => 400,
        Category::Chat => 800,
        Category::Analysis | Category::CodeReview => 1500,
        Category::CodeGeneration | Category::Planning => 2500,
        Category::Security => 2000,
    }
}

/// Static, immutable catalog. `ModelRegistry::new()` is the only allocation;
/// every lookup afterwards is a slice scan over a handful of entries.
pub struct ModelRegistry {
    specs: Vec<ModelTierSpec>,
    by_tier: HashMap<ModelTier, usize>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        let specs = catalog();
        let by_tier = specs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.tier, i))
            .collect();
        Self { specs, by_tier }
    }

    pub fn spec(&self, tier: ModelTier) -> &ModelTierSpec {
        let idx = self.by_tier[&tier];
        &self.specs[idx]
    }

    pub fn all_tiers(&self) -> impl Iterator<Item = &ModelTierSpec> {
        self.specs.iter()
    }

    /// Estimates the dollar cost of a completion at `tier` given expected
    /// input/output token counts. Uses the uncached input price unless
    /// cached/write token counts are supplied via `estimate_cost_detailed`.
    pub fn estimate_cost(&self, tier: ModelTier, input_tokens: u32, output_tokens: u32) -> Microcents {
        self.estimate_cost_detailed(tier, input_tokens, 0, 0, output_tokens)
    }

    /// Full cost formula, usable directly by `ProviderRegistry` once it has
    /// the provider's reported token split.
    pub fn estimate_cost_detailed(
        &self,
        tier: ModelTier,
        uncached_input_tokens: u32,
        cached_input_tokens: u32,
        cache_write_tokens: u32,
        output_tokens: u32,
    ) -> Microcents {
        let spec = self.spec(tier);
        Microcents::for_tokens(uncached_input_tokens, spec.input_price.0)
            + Microcents::for_tokens(cached_input_tokens, spec.cached_input_price.0)
            + Microcents::for_tokens(cache_write_tokens, spec.cache_write_price.0)
            + Microcents::for_tokens(output_tokens, spec.output_price.0)
    }

    /// A tier is available iff one of `available_providers` claims the tier's
    /// family. Takes the provider set as a parameter rather than holding a
    /// reference to `ProviderRegistry`, keeping this type I/O-free and
    /// independently constructible.
    pub fn is_available(&self, tier: ModelTier, available_providers: &[ProviderId]) -> bool {
        available_providers.contains(&tier.provider())
    }

    /// Next tier in the same family, or `None` if `tier` is already the top
    /// of its family. Undefined (returns `None`) across families.
    pub fn higher_tier(&self, tier: ModelTier) -> Option<ModelTier> {
        let spec = self.spec(tier);
        self.specs
            .iter()
            .filter(|s| s.family == spec.family && s.rank > spec.rank)
            .min_by_key(|s| s.rank)
            .map(|s| s.tier)
    }

    /// Tiers at or above the "Sonnet-or-above" security floor: rank >= 1
    /// within a family whose top tier has `reasoning` capability, i.e.
    /// excludes the cheapest tier of every family.
    pub fn meets_security_floor(&self, tier: ModelTier) -> bool {
        self.spec(tier).rank >= 1
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_invariants_hold_for_every_tier() {
        let registry = ModelRegistry::new();
        for spec in registry.all_tiers() {
            assert!(
                spec.cached_input_price <= spec.input_price,
                "{:?}: cached input price must not exceed input price",
                spec.tier
            );
            assert!(
                spec.cache_write_price >= spec.input_price || spec.cache_write_price == Microcents::ZERO,
                "{:?}: cache write price must be >= input price or free",
                spec.tier
            );
        }
    }

    #[test]
    fn higher_tier_walks_family_in_rank_order() {
        let registry = ModelRegistry::new();
        assert_eq!(
            registry.higher_tier(ModelTier::ClaudeHaiku45),
            Some(ModelTier::ClaudeSonnet45)
        );
        assert_eq!(
            registry.higher_tier(ModelTier::ClaudeOpus46),
            None,
            "top of family has no higher tier"
        );
    }

    #[test]
    fn estimate_cost_matches_manual_math() {
        let registry = ModelRegistry::new();
        let cost = registry.estimate_cost(ModelTier::ClaudeHaiku45, 1_000_000, 0);
        assert_eq!(cost, registry.spec(ModelTier::ClaudeHaiku45).input_price);
    }

    #[test]
    fn security_floor_excludes_cheapest_tier_per_family() {
        let registry = ModelRegistry::new();
        assert!(!registry.meets_security_floor(ModelTier::ClaudeHaiku45));
        assert!(registry.meets_security_floor(ModelTier::ClaudeSonnet45));
        assert!(!registry.meets_security_floor(ModelTier::GeminiFlashLite25));
    }

    #[test]
    fn is_available_checks_provider_presence() {
        let registry = ModelRegistry::new();
        assert!(registry.is_available(ModelTier::ClaudeHaiku45, &[ProviderId::Anthropic]));
        assert!(!registry.is_available(ModelTier::ClaudeHaiku45, &[ProviderId::OpenAI]));
    }
}
