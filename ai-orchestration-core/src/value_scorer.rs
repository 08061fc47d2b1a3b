//! # ValueScorer
//!
//! Picks a `ModelTier` for a request under the current budget. Two
//! independent jobs live here: classifying `content` into a `Complexity`
//! bucket, and scoring every available tier on a weighted combination of
//! quality, cost, latency, history, budget pressure, and circuit-breaker
//! health.

use crate::common::Microcents;
use crate::cost_tracker::ThrottleLevel;
use crate::model_registry::{ModelRegistry, ModelTier, ProviderId};
use crate::models::{Category, Complexity};
use crate::providers::HealthStatus;
use std::collections::HashMap;

/// Weighted-sum coefficients for `score`. Defaults chosen so the positive
/// group `{w_quality, w_history}` and the negative group `{w_cost, w_latency,
/// w_budget, w_circuit}` each sum to their respective share of 1.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub w_quality: f64,
    pub w_cost: f64,
    pub w_latency: f64,
    pub w_history: f64,
    pub w_budget: f64,
    pub w_circuit: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            w_quality: 0.35,
            w_cost: 0.25,
            w_latency: 0.10,
            w_history: 0.10,
            w_budget: 0.10,
            w_circuit: 0.10,
        }
    }
}

/// Request features `ValueScorer::score` consumes. Callers
/// typically derive `complexity` via `classify_complexity` and `history` via
/// whatever rolling per-tier success metric they track; this engine does not
/// mandate a particular history source.
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub complexity: Complexity,
    pub category: Category,
    pub security_sensitive: bool,
    pub budget_pressure: ThrottleLevel,
    /// tier → [0,1] historical performance score; tiers absent from this map
    /// are treated as neutral (0.5).
    pub historical_performance: HashMap<ModelTier, f64>,
    /// tier → health status of the provider serving it, when known.
    pub provider_health: HashMap<ModelTier, HealthStatus>,
    pub available_providers: Vec<ProviderId>,
    pub estimated_output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct TierBreakdown {
    pub tier: ModelTier,
    pub score: f64,
    pub quality_term: f64,
    pub cost_term: f64,
    pub latency_term: f64,
    pub history_term: f64,
    pub budget_term: f64,
    pub circuit_term: f64,
}

#[derive(Debug, Clone)]
pub struct ScoringResult {
    pub recommended_tier: ModelTier,
    pub score: f64,
    pub per_tier_breakdown: Vec<TierBreakdown>,
    pub reasoning: String,
}

/// Rule-based complexity classifier over raw request content. Order matters: `critical` and `complex` are checked before the
/// shorter-circuit `trivial`/`simple` cases so a long security-flagged
/// message is never misclassified as trivial.
pub fn classify_complexity(content: &str, category: Category) -> Complexity {
    const SENSITIVE_WORDS: &[&str] = &["production", "billing", "auth", "password"];

    let has_newline = content.contains('\n');
    let fence_count = content.matches("```").count() / 2;
    let lower = content.to_lowercase();

    if category == Category::Security || SENSITIVE_WORDS.iter().any(|w| lower.contains(w)) {
        return Complexity::Critical;
    }

    if content.len() > 1200
        || fence_count >= 3
        || matches!(
            category,
            Category::Planning | Category::CodeGeneration | Category::CodeReview
        )
    {
        return Complexity::Complex;
    }

    if content.len() < 80 && !has_newline && fence_count == 0 {
        return Complexity::Trivial;
    }

    if content.len() < 300 && matches!(category, Category::Query | Category::Chat | Category::Summarize) {
        return Complexity::Simple;
    }

    Complexity::Standard
}

pub struct ValueScorer {
    registry: ModelRegistry,
    weights: ScoringWeights,
}

impl ValueScorer {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            weights: ScoringWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Candidate tiers for this request: available, and — when
    /// `security_sensitive` — restricted to the "Sonnet-or-above" floor
    ///.
    fn candidate_tiers(&self, input: &ScoringInput) -> Vec<ModelTier> {
        self.registry
            .all_tiers()
            .map(|s| s.tier)
            .filter(|t| self.registry.is_available(*t, &input.available_providers))
            .filter(|t| !input.security_sensitive || self.registry.meets_security_floor(*t))
            .collect()
    }

    /// Normalizes `values` to `[0,1]` across the candidate set. A constant
    /// set (max == min) normalizes to `0.5` everywhere rather than dividing
    /// by zero.
    fn normalize(values: &[f64]) -> Vec<f64> {
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if (max - min).abs() < f64::EPSILON {
            return values.iter().map(|_| 0.5).collect();
        }
        values.iter().map(|v| (v - min) / (max - min)).collect()
    }

    fn pressure_penalty(&self, tier: ModelTier, pressure: ThrottleLevel) -> f64 {
        let spec = self.registry.spec(tier);
        let relative_price = spec.input_price.0 as f64;
        match pressure {
            ThrottleLevel::Normal => 0.0,
            ThrottleLevel::Warning => relative_price * 0.05 / 1_000_000.0,
            ThrottleLevel::Reduce => relative_price * 0.2 / 1_000_000.0,
            ThrottleLevel::Pause => relative_price * 0.5 / 1_000_000.0,
        }
    }

    fn circuit_penalty(&self, tier: ModelTier, input: &ScoringInput) -> f64 {
        match input.provider_health.get(&tier) {
            Some(HealthStatus::Down) => 1.0,
            Some(HealthStatus::Degraded) => 0.5,
            _ => 0.0,
        }
    }

    /// Scores every available tier and recommends the best one. Returns
    /// `None` only when `candidate_tiers` is empty — callers treat that as
    /// `NoAvailableModels`.
    pub fn score(&self, input: &ScoringInput) -> Option<ScoringResult> {
        let tiers = self.candidate_tiers(input);
        if tiers.is_empty() {
            return None;
        }

        let costs: Vec<f64> = tiers
            .iter()
            .map(|t| {
                self.registry
                    .estimate_cost(*t, estimated_input_tokens(input), input.estimated_output_tokens)
                    .0 as f64
            })
            .collect();
        let latencies: Vec<f64> = tiers.iter().map(|t| latency_proxy(*t)).collect();
        let qualities: Vec<f64> = tiers.iter().map(|t| quality_proxy(*t)).collect();

        let norm_cost = Self::normalize(&costs);
        let norm_latency = Self::normalize(&latencies);
        let norm_quality = Self::normalize(&qualities);

        let mut breakdown = Vec::with_capacity(tiers.len());
        for (i, tier) in tiers.iter().enumerate() {
            let history = input
                .historical_performance
                .get(tier)
                .copied()
                .unwrap_or(0.5);
            let quality_term = self.weights.w_quality * norm_quality[i];
            let cost_term = self.weights.w_cost * norm_cost[i];
            let latency_term = self.weights.w_latency * norm_latency[i];
            let history_term = self.weights.w_history * history;
            let budget_term = self.weights.w_budget * self.pressure_penalty(*tier, input.budget_pressure);
            let circuit_term = self.weights.w_circuit * self.circuit_penalty(*tier, input);

            let score = quality_term - cost_term - latency_term + history_term - budget_term - circuit_term;

            breakdown.push(TierBreakdown {
                tier: *tier,
                score,
                quality_term,
                cost_term,
                latency_term,
                history_term,
                budget_term,
                circuit_term,
            });
        }

        // Exclude non-essential (low-rank) tiers entirely once budget is paused,
        // unless doing so would empty the candidate set.
        if input.budget_pressure == ThrottleLevel::Pause {
            let essential: Vec<TierBreakdown> = breakdown
                .iter()
                .filter(|b| self.registry.spec(b.tier).rank >= 1)
                .cloned()
                .collect();
            if !essential.is_empty() {
                breakdown = essential;
            }
        }

        let best = breakdown
            .iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap())
            .cloned()?;

        let reasoning = dominant_terms_reasoning(&best);

        Some(ScoringResult {
            recommended_tier: best.tier,
            score: best.score,
            per_tier_breakdown: breakdown,
            reasoning,
        })
    }
}

fn estimated_input_tokens(input: &ScoringInput) -> u32 {
    // Rough proxy: scorer doesn't see the assembled prompt, only the category
    // and complexity; treat the expected output size as a stand-in order of
    // magnitude for the input side too, since both are used only to rank
    // relative cost across tiers rather than to bill anything.
    match input.complexity {
        Complexity::Trivial => 50,
        Complexity::Simple => 200,
        Complexity::Standard => 600,
        Complexity::Complex => 1500,
        Complexity::Critical => 1200,
    }
}

/// Quality proxy ordered by tier rank within a family — the registry has no
/// direct "quality" field, so rank (which already encodes the catalog's
/// price/capability ordering) stands in for it.
fn quality_proxy(tier: ModelTier) -> f64 {
    let registry = ModelRegistry::new();
    registry.spec(tier).rank as f64
}

/// Latency proxy: cheaper/smaller tiers within a family are assumed faster.
/// Uses input price as an inverse latency signal since this engine doesn't
/// measure live per-tier latency at scoring time (that's `HealthTracker`'s
/// `latency_ms`, captured only after a call completes).
fn latency_proxy(tier: ModelTier) -> f64 {
    let registry = ModelRegistry::new();
    registry.spec(tier).input_price.0 as f64
}

fn dominant_terms_reasoning(b: &TierBreakdown) -> String {
    let mut terms = vec![
        ("quality", b.quality_term),
        ("cost", -b.cost_term),
        ("latency", -b.latency_term),
        ("history", b.history_term),
        ("budget", -b.budget_term),
        ("circuit", -b.circuit_term),
    ];
    terms.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap());
    format!(
        "{} selected; dominant factors: {} ({:+.3}), {} ({:+.3})",
        b.tier, terms[0].0, terms[0].1, terms[1].0, terms[1].1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> ScoringInput {
        ScoringInput {
            complexity: Complexity::Standard,
            category: Category::Chat,
            security_sensitive: false,
            budget_pressure: ThrottleLevel::Normal,
            historical_performance: HashMap::new(),
            provider_health: HashMap::new(),
            available_providers: vec![
                ProviderId::Anthropic,
                ProviderId::OpenAI,
                ProviderId::Google,
                ProviderId::Xai,
            ],
            estimated_output_tokens: 400,
        }
    }

    #[test]
    fn classifies_trivial_content() {
        assert_eq!(classify_complexity("What is 2+2?", Category::Query), Complexity::Trivial);
    }

    #[test]
    fn classifies_critical_on_sensitive_keyword() {
        assert_eq!(
            classify_complexity("fix the auth middleware", Category::CodeReview),
            Complexity::Critical
        );
    }

    #[test]
    fn classifies_critical_for_security_category_regardless_of_length() {
        assert_eq!(classify_complexity("hi", Category::Security), Complexity::Critical);
    }

    #[test]
    fn classifies_complex_on_long_content() {
        let content = "x".repeat(1300);
        assert_eq!(classify_complexity(&content, Category::Chat), Complexity::Complex);
    }

    #[test]
    fn classifies_simple_short_query() {
        assert_eq!(
            classify_complexity("what's the weather like", Category::Query),
            Complexity::Simple
        );
    }

    #[test]
    fn security_sensitive_excludes_cheapest_tier_per_family() {
        let scorer = ValueScorer::new(ModelRegistry::new());
        let mut input = base_input();
        input.security_sensitive = true;
        let result = scorer.score(&input).unwrap();
        assert!(result
            .per_tier_breakdown
            .iter()
            .all(|b| scorer.registry.spec(b.tier).rank >= 1));
    }

    #[test]
    fn no_available_providers_yields_none() {
        let scorer = ValueScorer::new(ModelRegistry::new());
        let mut input = base_input();
        input.available_providers = vec![];
        assert!(scorer.score(&input).is_none());
    }

    #[test]
    fn pause_excludes_cheapest_tiers_when_alternatives_exist() {
        let scorer = ValueScorer::new(ModelRegistry::new());
        let mut input = base_input();
        input.budget_pressure = ThrottleLevel::Pause;
        let result = scorer.score(&input).unwrap();
        assert!(result
            .per_tier_breakdown
            .iter()
            .all(|b| scorer.registry.spec(b.tier).rank >= 1));
    }

    #[test]
    fn down_provider_is_penalized_relative_to_healthy_one() {
        let scorer = ValueScorer::new(ModelRegistry::new());
        let mut input = base_input();
        input
            .provider_health
            .insert(ModelTier::ClaudeHaiku45, HealthStatus::Down);
        let result = scorer.score(&input).unwrap();
        let haiku = result
            .per_tier_breakdown
            .iter()
            .find(|b| b.tier == ModelTier::ClaudeHaiku45)
            .unwrap();
        assert!(haiku.circuit_term > 0.0);
    }
}
