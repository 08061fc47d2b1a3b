//! Builds an `Orchestrator` from a loaded `Config`.

use crate::config::Config;
use ai_orchestration_core::providers::anthropic::AnthropicProvider;
use ai_orchestration_core::providers::google::GoogleProvider;
use ai_orchestration_core::providers::openai::OpenAIProvider;
use ai_orchestration_core::providers::xai::XaiProvider;
use ai_orchestration_core::{
    AutoApproveGovernance, FeatureFlags, InMemoryCostTracker, Microcents, NullEventBus,
    Orchestrator, ProviderRegistry,
};
use std::sync::Arc;

/// Registers every enabled, keyed provider from `config` and constructs an
/// `Orchestrator` wired to an in-memory cost tracker sized off
/// `daily_budget_dollars` and an auto-approve governance gate (the CLI has
/// no human-in-the-loop channel to route approvals through).
pub fn build_orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    let mut providers = ProviderRegistry::new();

    for (name, settings) in &config.providers {
        if !settings.enabled || settings.api_key.is_empty() {
            continue;
        }
        let provider_config = settings.clone().into_provider_config();
        match name.as_str() {
            "anthropic" => providers.register(Arc::new(AnthropicProvider::new(provider_config)?)),
            "openai" => providers.register(Arc::new(OpenAIProvider::new(provider_config)?)),
            "google" => providers.register(Arc::new(GoogleProvider::new(provider_config)?)),
            "xai" => providers.register(Arc::new(XaiProvider::new(provider_config)?)),
            other => {
                tracing::warn!("ignoring unknown provider key in config: {other}");
            }
        }
    }

    let cost_tracker = InMemoryCostTracker::new(Microcents::from_dollars(config.daily_budget_dollars));
    let feature_flags: FeatureFlags = config.features.clone().into();
    let governance = feature_flags
        .governance_enabled
        .then(|| Arc::new(AutoApproveGovernance) as Arc<dyn ai_orchestration_core::Governance>);

    Ok(Orchestrator::new(
        Arc::new(NullEventBus),
        Arc::new(providers),
        cost_tracker,
        governance,
        feature_flags,
    ))
}
