//! Configuration loading for the orchestration CLI.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variable overrides (`AI_ORCH_*` for scalars, `<PROVIDER>_API_KEY`
//! for credentials) — the same precedence order the engine's feature flags
//! follow, just expressed as a file instead of code defaults.

use ai_orchestration_core::providers::ProviderConfig;
use ai_orchestration_core::FeatureFlags;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
    #[serde(default)]
    pub features: FeatureSettings,
    #[serde(default = "default_daily_budget")]
    pub daily_budget_dollars: f64,
    #[serde(default = "default_agent")]
    pub default_agent: String,
}

/// Mirrors `ProviderConfig`, but `Deserialize`-friendly: the engine's type
/// stores a `Duration` and isn't meant to round-trip through TOML directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: String,
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            priority: default_priority(),
            enabled: true,
        }
    }
}

impl ProviderSettings {
    pub fn into_provider_config(self) -> ProviderConfig {
        let mut config = ProviderConfig::new(self.api_key).with_priority(self.priority);
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.max_retries = self.max_retries;
        config.enabled = self.enabled;
        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSettings {
    #[serde(default = "default_true")]
    pub orchestrator_enabled: bool,
    #[serde(default = "default_true")]
    pub prompt_caching_enabled: bool,
    #[serde(default)]
    pub governance_enabled: bool,
    #[serde(default = "default_true")]
    pub quality_escalation_enabled: bool,
    #[serde(default = "default_governance_threshold")]
    pub governance_cost_threshold_dollars: f64,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            orchestrator_enabled: true,
            prompt_caching_enabled: true,
            governance_enabled: false,
            quality_escalation_enabled: true,
            governance_cost_threshold_dollars: default_governance_threshold(),
        }
    }
}

impl From<FeatureSettings> for FeatureFlags {
    fn from(f: FeatureSettings) -> Self {
        FeatureFlags {
            orchestrator_enabled: f.orchestrator_enabled,
            prompt_caching_enabled: f.prompt_caching_enabled,
            governance_enabled: f.governance_enabled,
            quality_escalation_enabled: f.quality_escalation_enabled,
            governance_cost_threshold_dollars: f.governance_cost_threshold_dollars,
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_priority() -> u32 {
    50
}
fn default_true() -> bool {
    true
}
fn default_governance_threshold() -> f64 {
    1.0
}
fn default_daily_budget() -> f64 {
    50.0
}
fn default_agent() -> String {
    "cli".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            features: FeatureSettings::default(),
            daily_budget_dollars: default_daily_budget(),
            default_agent: default_agent(),
        }
    }
}

impl Config {
    /// Loads defaults, merges an optional TOML file at `path` if it exists,
    /// then applies environment overrides. Missing files are not an error —
    /// the CLI can run entirely from environment variables.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        for name in ["anthropic", "openai", "google", "xai"] {
            let env_key = format!("{}_API_KEY", name.to_uppercase());
            if let Ok(api_key) = env::var(&env_key) {
                let entry = self.providers.entry(name.to_string()).or_default();
                if !api_key.is_empty() {
                    entry.api_key = api_key;
                }
            }
        }

        if let Ok(budget) = env::var("AI_ORCH_DAILY_BUDGET_DOLLARS") {
            self.daily_budget_dollars = budget
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid AI_ORCH_DAILY_BUDGET_DOLLARS: {}", budget))?;
        }

        if let Ok(agent) = env::var("AI_ORCH_DEFAULT_AGENT") {
            if !agent.is_empty() {
                self.default_agent = agent;
            }
        }

        if let Ok(flag) = env::var("AI_ORCH_GOVERNANCE_ENABLED") {
            self.features.governance_enabled = flag.parse().unwrap_or(false);
        }

        if let Ok(flag) = env::var("AI_ORCH_QUALITY_ESCALATION_ENABLED") {
            self.features.quality_escalation_enabled = flag.parse().unwrap_or(true);
        }

        if let Ok(flag) = env::var("AI_ORCH_PROMPT_CACHING_ENABLED") {
            self.features.prompt_caching_enabled = flag.parse().unwrap_or(true);
        }

        if let Ok(threshold) = env::var("AI_ORCH_GOVERNANCE_COST_THRESHOLD_DOLLARS") {
            self.features.governance_cost_threshold_dollars = threshold.parse().map_err(|_| {
                anyhow::anyhow!(
                    "Invalid AI_ORCH_GOVERNANCE_COST_THRESHOLD_DOLLARS: {}",
                    threshold
                )
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.daily_budget_dollars <= 0.0 {
            return Err(anyhow::anyhow!("daily_budget_dollars must be positive"));
        }

        let enabled_with_key = self
            .providers
            .values()
            .any(|p| p.enabled && !p.api_key.is_empty());
        if !enabled_with_key {
            return Err(anyhow::anyhow!(
                "at least one provider must be enabled with a non-empty API key"
            ));
        }

        for (name, provider) in &self.providers {
            if provider.enabled && provider.api_key.is_empty() {
                return Err(anyhow::anyhow!(
                    "provider {} is enabled but has no API key configured",
                    name
                ));
            }
            if provider.timeout_secs == 0 {
                return Err(anyhow::anyhow!("provider {} has zero timeout", name));
            }
        }

        if self.features.governance_cost_threshold_dollars < 0.0 {
            return Err(anyhow::anyhow!(
                "governance_cost_threshold_dollars cannot be negative"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fails_validation_without_a_provider() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_with_a_provider_key_validates() {
        let mut config = Config::default();
        config.providers.insert(
            "anthropic".to_string(),
            ProviderSettings {
                api_key: "test-key".to_string(),
                ..Default::default()
            },
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let mut config = Config::default();
        config.providers.insert(
            "anthropic".to_string(),
            ProviderSettings {
                api_key: "test-key".to_string(),
                ..Default::default()
            },
        );
        config.daily_budget_dollars = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn provider_settings_convert_into_engine_provider_config() {
        let settings = ProviderSettings {
            api_key: "sk-test".to_string(),
            base_url: Some("https://example.test".to_string()),
            timeout_secs: 45,
            max_retries: 2,
            priority: 80,
            enabled: true,
        };
        let provider_config = settings.into_provider_config();
        assert_eq!(provider_config.api_key, "sk-test");
        assert_eq!(provider_config.priority, 80);
        assert_eq!(provider_config.timeout, Duration::from_secs(45));
    }
}
