//! # Error Handling
//!
//! Three error enums, one per concern, following the same `thiserror` pattern
//! throughout this crate: `ProviderError` for upstream API/transport failures,
//! `ConfigError` for invalid provider/orchestrator configuration, and
//! `OrchestratorError` for everything the pipeline in `orchestrator` can
//! reject a request with. `OrchestratorError` wraps the other two via `#[from]`
//! so a single `?` chain works across layers.

use thiserror::Error;

/// Provider-specific API and communication errors.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {code} - {message}")]
    Api { code: u16, message: String },

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Quota exceeded")]
    QuotaExceeded,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Timeout")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid response format")]
    InvalidResponse,

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Feature not supported: {feature}")]
    FeatureNotSupported { feature: String },

    #[error("Cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether `completeWithFallback` should try the next provider, or
    /// surface the error immediately: transient == network, 5xx,
    /// rate-limit; permanent == auth, invalid-request, quota.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(_)
            | ProviderError::RateLimit
            | ProviderError::ServiceUnavailable
            | ProviderError::Timeout => true,
            ProviderError::Api { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

/// Configuration-load and validation errors (provider credentials, feature
/// flags, cascade chain definitions).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration: {field}")]
    Missing { field: String },

    #[error("invalid configuration value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("unknown model tier: {tier}")]
    UnknownTier { tier: String },
}

/// The error taxonomy the pipeline can reject a request with, one variant
/// per failure class.
///
/// Every variant carries `stage`, the pipeline step it failed at, so callers
/// and logs can tell a budget rejection from a circuit-open rejection without
/// string-matching the message.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("invalid request at stage {stage}: {message}")]
    InvalidRequest { stage: &'static str, message: String },

    #[error("budget exceeded at stage {stage}: {reason}")]
    BudgetExceeded { stage: &'static str, reason: String },

    #[error("circuit open at stage {stage}")]
    CircuitOpen { stage: &'static str },

    #[error("governance denied at stage {stage}: {reason}")]
    GovernanceDenied { stage: &'static str, reason: String },

    #[error("no provider supports model {model} (stage {stage})")]
    NoProvider { stage: &'static str, model: String },

    #[error("no available models for chain {chain} (stage {stage})")]
    NoAvailableModels { stage: &'static str, chain: String },

    #[error("transient provider failure at stage {stage}: {source}")]
    ProviderTransient {
        stage: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("permanent provider failure at stage {stage}: {source}")]
    ProviderPermanent {
        stage: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("cancelled at stage {stage}")]
    Cancelled { stage: &'static str },

    #[error("timeout at stage {stage}")]
    Timeout { stage: &'static str },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl OrchestratorError {
    pub fn stage(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidRequest { stage, .. }
            | OrchestratorError::BudgetExceeded { stage, .. }
            | OrchestratorError::CircuitOpen { stage }
            | OrchestratorError::GovernanceDenied { stage, .. }
            | OrchestratorError::NoProvider { stage, .. }
            | OrchestratorError::NoAvailableModels { stage, .. }
            | OrchestratorError::ProviderTransient { stage, .. }
            | OrchestratorError::ProviderPermanent { stage, .. }
            | OrchestratorError::Cancelled { stage }
            | OrchestratorError::Timeout { stage } => stage,
            OrchestratorError::Config(_) => "config",
        }
    }

    /// Whether this error class short-circuits before any upstream call.
    pub fn short_circuits_before_upstream(&self) -> bool {
        matches!(
            self,
            OrchestratorError::InvalidRequest { .. }
                | OrchestratorError::BudgetExceeded { .. }
                | OrchestratorError::CircuitOpen { .. }
                | OrchestratorError::GovernanceDenied { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_classified_correctly() {
        assert!(ProviderError::RateLimit.is_transient());
        assert!(ProviderError::ServiceUnavailable.is_transient());
        assert!(ProviderError::Api {
            code: 503,
            message: "down".into()
        }
        .is_transient());
        assert!(!ProviderError::InvalidApiKey.is_transient());
        assert!(!ProviderError::QuotaExceeded.is_transient());
    }

    #[test]
    fn pre_upstream_classes_short_circuit() {
        let err = OrchestratorError::BudgetExceeded {
            stage: "budget",
            reason: "pause".into(),
        };
        assert!(err.short_circuits_before_upstream());
        assert_eq!(err.stage(), "budget");

        let err = OrchestratorError::ProviderTransient {
            stage: "upstream",
            source: ProviderError::RateLimit,
        };
        assert!(!err.short_circuits_before_upstream());
    }
}
