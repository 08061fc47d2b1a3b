use ai_orchestration_core::model_registry::{ModelRegistry, ModelTier};
use ai_orchestration_core::models::{Category, Complexity};
use ai_orchestration_core::response_evaluator::ResponseEvaluator;
use ai_orchestration_core::value_scorer::{ScoringInput, ValueScorer};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::HashMap;

fn scoring_input(category: Category, complexity: Complexity) -> ScoringInput {
    ScoringInput {
        complexity,
        category,
        security_sensitive: false,
        budget_pressure: 0.2,
        historical_performance: HashMap::new(),
        provider_health: HashMap::new(),
        available_providers: vec![
            ai_orchestration_core::model_registry::ProviderId::Anthropic,
            ai_orchestration_core::model_registry::ProviderId::OpenAI,
            ai_orchestration_core::model_registry::ProviderId::Google,
            ai_orchestration_core::model_registry::ProviderId::Xai,
        ],
        estimated_output_tokens: 800,
    }
}

fn bench_value_scorer(c: &mut Criterion) {
    let scorer = ValueScorer::new();
    let input = scoring_input(Category::Chat, Complexity::Standard);

    c.bench_function("value_scorer_score_standard_chat", |b| {
        b.iter(|| {
            let _result = scorer.score(black_box(&input));
        });
    });

    let complex_input = scoring_input(Category::Planning, Complexity::Complex);
    c.bench_function("value_scorer_score_complex_planning", |b| {
        b.iter(|| {
            let _result = scorer.score(black_box(&complex_input));
        });
    });
}

fn bench_cost_estimation(c: &mut Criterion) {
    let registry = ModelRegistry::new();

    c.bench_function("estimate_cost_single_tier", |b| {
        b.iter(|| {
            let _cost = registry.estimate_cost(black_box(ModelTier::ClaudeSonnet45), 1500, 800);
        });
    });

    c.bench_function("estimate_cost_all_tiers", |b| {
        b.iter(|| {
            for tier in registry.all_tiers() {
                let _cost = registry.estimate_cost(black_box(*tier), 1500, 800);
            }
        });
    });
}

fn bench_response_evaluator(c: &mut Criterion) {
    let evaluator = ResponseEvaluator::new();
    let query = "Explain the tradeoffs between optimistic and pessimistic locking in a distributed database.";
    let response = "Here is the answer: optimistic locking assumes low contention and checks versions \
        at commit time, while pessimistic locking acquires locks upfront. 1. Optimistic suits read-heavy \
        workloads. 2. Pessimistic suits write-heavy, high-contention workloads.";

    c.bench_function("response_evaluator_score", |b| {
        b.iter(|| {
            let _score = evaluator.score(black_box(query), black_box(response));
        });
    });
}

criterion_group!(
    benches,
    bench_value_scorer,
    bench_cost_estimation,
    bench_response_evaluator
);
criterion_main!(benches);
