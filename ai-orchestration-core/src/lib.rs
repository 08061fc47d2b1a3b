//! # AI Orchestration Core
//!
//! A value-aware routing engine sitting in front of four upstream LLM
//! providers (Anthropic, OpenAI, Google, xAI). Given a request, it classifies
//! the work, picks the cheapest model tier expected to clear a quality bar,
//! calls upstream with provider-level fallback, scores the response, and
//! escalates to a stronger tier at most once if the response falls short.
//!
//! ## Overview
//!
//! The engine provides:
//! - **Value-based model selection**: `ValueScorer` weighs quality, cost,
//!   latency, historical performance, budget pressure, and circuit health to
//!   pick a tier, rather than routing on static rules alone.
//! - **Cascade routing**: `CascadeRouter` offers an alternative cheap-to-
//!   expensive traversal mode for callers who want explicit chains instead of
//!   single-shot scoring.
//! - **Quality-gated escalation**: `ResponseEvaluator` scores every
//!   completion; a response below its complexity-appropriate threshold
//!   triggers one retry at the next tier up, never more.
//! - **Two layers of failure protection**: a per-provider health ladder
//!   (`providers::HealthTracker`) and an orchestrator-level `CircuitBreaker`
//!   that opens when every upstream is failing.
//! - **External collaborators, not ambient globals**: `CostTracker` and
//!   `Governance` are injected traits; this crate defines the contract and a
//!   minimal in-memory/auto-approve implementation of each, not a production
//!   budget ledger or approval workflow.
//!
//! ## Quick start
//!
//! ```no_run
//! use ai_orchestration_core::{
//!     AIRequest, Category, CostTracker, EventBus, FeatureFlags, InMemoryCostTracker,
//!     NullEventBus, Orchestrator, ProviderRegistry,
//! };
//! use ai_orchestration_core::providers::anthropic::AnthropicProvider;
//! use ai_orchestration_core::providers::ProviderConfig;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut providers = ProviderRegistry::new();
//! providers.register(Arc::new(AnthropicProvider::new(
//!     ProviderConfig::new(std::env::var("ANTHROPIC_API_KEY")?),
//! )?));
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(NullEventBus),
//!     Arc::new(providers),
//!     InMemoryCostTracker::new(ai_orchestration_core::common::Microcents::from_dollars(50.0)),
//!     None,
//!     FeatureFlags::default(),
//! );
//!
//! let response = orchestrator.query("What is 2+2?", "demo-agent").await?;
//! println!("{response}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Two execution modes
//!
//! `Orchestrator::execute` runs the full 15-step pipeline: validate, classify,
//! budget check, circuit check, select model via `ValueScorer`, governance
//! gate, assemble the prompt, call upstream, evaluate quality, escalate at
//! most once, then return. `CascadeRouter::run` is a simpler alternative for
//! callers who prefer a named, explicit cheap-first chain (`"frugal"`,
//! `"code"`, `"security"`, ...) over per-request scoring.
//!
//! ## Configuration surface
//!
//! Feature flags (`FeatureFlags`) gate the orchestrator, prompt caching,
//! governance, and quality-based escalation; see the CLI crate's `config`
//! module for how these map onto environment variables and a layered TOML
//! configuration file.

pub mod cascade;
pub mod circuit_breaker;
pub mod common;
pub mod cost_tracker;
pub mod error;
pub mod events;
pub mod governance;
pub mod model_registry;
pub mod models;
pub mod orchestrator;
pub mod prompt_assembler;
pub mod provider_registry;
pub mod providers;
pub mod response_evaluator;
pub mod value_scorer;

pub use cascade::{CascadeChain, CascadeRouter, CascadeRunOutcome, CascadeStep};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use common::Microcents;
pub use cost_tracker::{CostTracker, InMemoryCostTracker, ProceedDecision, ThrottleLevel, TrackUsage};
pub use error::{ConfigError, OrchestratorError, ProviderError};
pub use events::{BroadcastEventBus, Event, EventBus, NullEventBus};
pub use governance::{ApprovalDecision, AutoApproveGovernance, AutoDenyGovernance, Governance};
pub use model_registry::{ModelRegistry, ModelTier, ProviderId};
pub use models::{
    AIRequest, AIResponse, Category, Complexity, ConversationMessage, ConversationRole,
    FinishReason, ParsedCommand, Priority, TrustLevel,
};
pub use orchestrator::{CancellationToken, FeatureFlags, Orchestrator, OrchestratorStatus};
pub use prompt_assembler::PromptAssembler;
pub use provider_registry::{PricedCompletion, ProviderRegistry};
pub use response_evaluator::ResponseEvaluator;
pub use value_scorer::{ScoringInput, ScoringResult, ScoringWeights, ValueScorer};

/// Convenience result alias for fallible engine operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
