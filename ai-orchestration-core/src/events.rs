//! # Event Bus
//!
//! An injected `EventBus` collaborator the `Orchestrator` publishes
//! lifecycle events to, and the typed payloads for each named topic.
//! Modeled as a trait, not a global singleton; the in-process implementation
//! backs it with `tokio::sync::broadcast`, the pattern this corpus already
//! reaches for when it needs pub/sub without a message broker.
//!
//! Publishing must never block the caller and must never run subscriber
//! callbacks while the orchestrator holds its own locks; the
//! broadcast-channel implementation satisfies this by handing payloads to
//! the channel and returning immediately, with receivers draining on their
//! own task.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestReceived {
    pub request_id: Uuid,
    pub category: crate::models::Category,
    pub complexity: crate::models::Complexity,
    pub agent: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelected {
    pub request_id: Uuid,
    pub model: String,
    pub value_score: f64,
    pub reasoning: String,
    pub estimated_cost: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStart {
    pub model: String,
    pub estimated_tokens: u32,
}

/// `llm:request_complete` — the single source of truth for the
/// `CostTracker`. Emitted exactly once per `execute()` call, success or
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestComplete {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
    pub task_type: String,
    pub task_category: crate::models::Category,
    pub duration_ms: u64,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEvaluated {
    pub request_id: Uuid,
    pub quality_score: f64,
    pub escalated: bool,
    pub escalation_reason: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStateChanged {
    pub previous_state: crate::circuit_breaker::CircuitState,
    pub new_state: crate::circuit_breaker::CircuitState,
    pub failures: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeStarted {
    pub chain: String,
    pub query_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeStepComplete {
    pub chain: String,
    pub step: usize,
    pub model: String,
    pub quality: f64,
    pub escalated: bool,
    pub cost_cents: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeComplete {
    pub chain: String,
    pub final_model: String,
    pub total_steps: usize,
    pub total_cost_cents: f64,
    pub duration_ms: u64,
}

/// One variant per published topic. A closed enum rather than a
/// `(String, Value)` pair, so subscribers pattern-match instead of parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload")]
pub enum Event {
    #[serde(rename = "ai:request_received")]
    RequestReceived(RequestReceived),
    #[serde(rename = "ai:model_selected")]
    ModelSelected(ModelSelected),
    #[serde(rename = "llm:request_start")]
    RequestStart(RequestStart),
    #[serde(rename = "llm:request_complete")]
    RequestComplete(RequestComplete),
    #[serde(rename = "ai:response_evaluated")]
    ResponseEvaluated(ResponseEvaluated),
    #[serde(rename = "ai:circuit_breaker_state_changed")]
    CircuitBreakerStateChanged(CircuitBreakerStateChanged),
    #[serde(rename = "cascade:started")]
    CascadeStarted(CascadeStarted),
    #[serde(rename = "cascade:step_complete")]
    CascadeStepComplete(CascadeStepComplete),
    #[serde(rename = "cascade:complete")]
    CascadeComplete(CascadeComplete),
}

impl Event {
    pub fn topic(&self) -> &'static str {
        match self {
            Event::RequestReceived(_) => "ai:request_received",
            Event::ModelSelected(_) => "ai:model_selected",
            Event::RequestStart(_) => "llm:request_start",
            Event::RequestComplete(_) => "llm:request_complete",
            Event::ResponseEvaluated(_) => "ai:response_evaluated",
            Event::CircuitBreakerStateChanged(_) => "ai:circuit_breaker_state_changed",
            Event::CascadeStarted(_) => "cascade:started",
            Event::CascadeStepComplete(_) => "cascade:step_complete",
            Event::CascadeComplete(_) => "cascade:complete",
        }
    }
}

/// Injected pub/sub collaborator. `emit` must not
/// block the publisher; an implementation may still deliver synchronously to
/// subscribers as long as it does so off the orchestrator's own locks.
pub trait EventBus: Send + Sync {
    fn emit(&self, event: Event);
}

/// `tokio::sync::broadcast`-backed bus. Subscribers that fall behind drop
/// the oldest events rather than back-pressuring the publisher, matching
/// broadcast's lagged-receiver semantics; this is the correct tradeoff for
/// a telemetry bus where a live dashboard only cares about recent state.
pub struct BroadcastEventBus {
    sender: tokio::sync::broadcast::Sender<Event>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus for BroadcastEventBus {
    fn emit(&self, event: Event) {
        // No active subscribers is not an error: events are fire-and-forget.
        let _ = self.sender.send(event);
    }
}

/// A bus that drops every event; useful for tests and for callers that don't
/// need lifecycle observability.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _event: Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_match_spec_strings() {
        let event = Event::RequestStart(RequestStart {
            model: "claude-haiku-4.5".into(),
            estimated_tokens: 100,
        });
        assert_eq!(event.topic(), "llm:request_start");
    }

    #[tokio::test]
    async fn broadcast_bus_delivers_to_subscriber() {
        let bus = BroadcastEventBus::new(16);
        let mut rx = bus.subscribe();
        bus.emit(Event::CascadeStarted(CascadeStarted {
            chain: "frugal".into(),
            query_length: 12,
        }));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic(), "cascade:started");
    }

    #[test]
    fn null_bus_never_panics_without_subscribers() {
        let bus = NullEventBus;
        bus.emit(Event::CascadeStarted(CascadeStarted {
            chain: "bulk".into(),
            query_length: 1,
        }));
    }
}
