//! # CostTracker collaborator
//!
//! `CostTracker` is an external collaborator the core *consumes*:
//! `canProceed`/`track` are non-blocking, in-memory counters behind a
//! short-held lock; the core reads `ThrottleLevel` but never mutates it.
//! This module defines the trait boundary plus an in-memory reference
//! implementation, since a real deployment's budget persistence (an
//! audit-chain ledger, a dashboard's daily rollups) is out of this engine's
//! scope but tests and the CLI binary still need something to construct.

use crate::common::Microcents;
use crate::models::Priority;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Budget health, read by the orchestrator at step 3 and by `ValueScorer`'s
/// `pressurePenalty` term; owned and mutated only by `CostTracker`
/// implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleLevel {
    Normal,
    Warning,
    Reduce,
    Pause,
}

pub struct ProceedDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

pub struct TrackUsage {
    pub operation: String,
    pub agent: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: Microcents,
}

/// External collaborator trait; `Orchestrator` holds an
/// `Arc<dyn CostTracker>` and never assumes a concrete implementation.
#[async_trait]
pub trait CostTracker: Send + Sync {
    async fn can_proceed(&self, estimated_tokens: u32, priority: Priority) -> ProceedDecision;
    async fn track(&self, usage: TrackUsage);
    async fn throttle_level(&self) -> ThrottleLevel;
    async fn shutdown(&self);
}

/// In-memory reference `CostTracker`: a daily microcent ceiling with
/// graduated throttle thresholds at 70%/90%/100% of the ceiling. `URGENT`
/// priority bypasses the `pause` block; no non-urgent request proceeds once
/// the ceiling is reached.
pub struct InMemoryCostTracker {
    daily_limit: Microcents,
    spent: AtomicU64,
    requests_tracked: Mutex<u64>,
}

impl InMemoryCostTracker {
    pub fn new(daily_limit: Microcents) -> Arc<Self> {
        Arc::new(Self {
            daily_limit,
            spent: AtomicU64::new(0),
            requests_tracked: Mutex::new(0),
        })
    }

    fn current_level(&self, spent: u64) -> ThrottleLevel {
        if self.daily_limit.0 == 0 {
            return ThrottleLevel::Normal;
        }
        let ratio = spent as f64 / self.daily_limit.0 as f64;
        if ratio >= 1.0 {
            ThrottleLevel::Pause
        } else if ratio >= 0.9 {
            ThrottleLevel::Reduce
        } else if ratio >= 0.7 {
            ThrottleLevel::Warning
        } else {
            ThrottleLevel::Normal
        }
    }

    pub fn total_spent(&self) -> Microcents {
        Microcents(self.spent.load(Ordering::Relaxed))
    }
}

#[async_trait]
impl CostTracker for InMemoryCostTracker {
    async fn can_proceed(&self, _estimated_tokens: u32, priority: Priority) -> ProceedDecision {
        let spent = self.spent.load(Ordering::Relaxed);
        let level = self.current_level(spent);
        if level == ThrottleLevel::Pause && priority != Priority::Urgent {
            return ProceedDecision {
                allowed: false,
                reason: Some("daily budget exhausted".to_string()),
            };
        }
        ProceedDecision {
            allowed: true,
            reason: None,
        }
    }

    async fn track(&self, usage: TrackUsage) {
        self.spent.fetch_add(usage.cost.0, Ordering::Relaxed);
        let mut count = self.requests_tracked.lock().await;
        *count += 1;
        tracing::debug!(
            provider = %usage.provider,
            model = %usage.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            cost_microcents = usage.cost.0,
            "tracked usage"
        );
    }

    async fn throttle_level(&self) -> ThrottleLevel {
        self.current_level(self.spent.load(Ordering::Relaxed))
    }

    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_blocks_standard_but_not_urgent() {
        let tracker = InMemoryCostTracker::new(Microcents(1_000_000));
        tracker
            .track(TrackUsage {
                operation: "test".into(),
                agent: "agent-1".into(),
                provider: "anthropic".into(),
                model: "claude-haiku-4.5".into(),
                input_tokens: 0,
                output_tokens: 0,
                cost: Microcents(1_000_000),
            })
            .await;
        assert_eq!(tracker.throttle_level().await, ThrottleLevel::Pause);

        let standard = tracker.can_proceed(100, Priority::Standard).await;
        assert!(!standard.allowed);

        let urgent = tracker.can_proceed(100, Priority::Urgent).await;
        assert!(urgent.allowed);
    }

    #[tokio::test]
    async fn graduated_throttle_thresholds() {
        let tracker = InMemoryCostTracker::new(Microcents(1_000_000));
        assert_eq!(tracker.throttle_level().await, ThrottleLevel::Normal);

        tracker
            .track(TrackUsage {
                operation: "t".into(),
                agent: "a".into(),
                provider: "p".into(),
                model: "m".into(),
                input_tokens: 0,
                output_tokens: 0,
                cost: Microcents(750_000),
            })
            .await;
        assert_eq!(tracker.throttle_level().await, ThrottleLevel::Warning);
    }
}
