//! # CircuitBreaker (orchestrator-level)
//!
//! The single breaker that protects the caller when *every* upstream is
//! failing. This is a distinct instance from the per-provider
//! health ladder in `providers::HealthStatus` — that one sheds an individual
//! upstream; this one shields `Orchestrator::execute` itself. Both are
//! generalized from the CLOSED/HALF_OPEN/OPEN shape already used for
//! per-provider protection in this codebase, reused here at orchestrator
//! scope with the simpler single-probe half-open rule specifies
//! (one success closes, one failure reopens — no `half_open_max_calls`).

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    last_opened_at: Option<Instant>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_opened_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

/// A state transition, returned by `record_success`/`record_failure`/
/// `can_execute` so callers can emit `ai:circuit_breaker_state_changed`
/// without re-deriving "did the state actually change" themselves. Only
/// transitions emit events.
pub struct Transition {
    pub previous: CircuitState,
    pub new: CircuitState,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// `false` iff `OPEN` and the cooldown has not yet expired. A call that
    /// observes the cooldown has elapsed transitions the breaker to
    /// `HALF_OPEN` and returns `true` — the caller's subsequent single probe
    /// decides whether it goes to `CLOSED` or back to `OPEN`.
    pub async fn can_execute(&self) -> (bool, Option<Transition>) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => (true, None),
            CircuitState::Open => {
                let elapsed = inner
                    .last_opened_at
                    .map(|t| t.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(false);
                if elapsed {
                    let previous = inner.state;
                    inner.state = CircuitState::HalfOpen;
                    (
                        true,
                        Some(Transition {
                            previous,
                            new: CircuitState::HalfOpen,
                        }),
                    )
                } else {
                    (false, None)
                }
            }
        }
    }

    /// `HALF_OPEN -> CLOSED` on one success; `CLOSED` stays `CLOSED` and
    /// resets its failure counter.
    pub async fn record_success(&self) -> Option<Transition> {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures = 0;
        if inner.state != CircuitState::Closed {
            let previous = inner.state;
            inner.state = CircuitState::Closed;
            inner.last_opened_at = None;
            return Some(Transition {
                previous,
                new: CircuitState::Closed,
            });
        }
        None
    }

    /// `CLOSED -> OPEN` once `consecutive_failures >= failure_threshold`;
    /// `HALF_OPEN -> OPEN` unconditionally on a single failed probe.
    pub async fn record_failure(&self) -> Option<Transition> {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures += 1;
        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.last_opened_at = Some(Instant::now());
                    Some(Transition {
                        previous: CircuitState::Closed,
                        new: CircuitState::Open,
                    })
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.last_opened_at = Some(Instant::now());
                Some(Transition {
                    previous: CircuitState::HalfOpen,
                    new: CircuitState::Open,
                })
            }
            CircuitState::Open => {
                inner.last_opened_at = Some(Instant::now());
                None
            }
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub async fn get_stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock().await;
        CircuitBreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
        });
        assert!(cb.record_failure().await.is_none());
        assert!(cb.record_failure().await.is_none());
        let transition = cb.record_failure().await.unwrap();
        assert_eq!(transition.new, CircuitState::Open);
        assert_eq!(cb.get_state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn open_blocks_execution_until_cooldown_elapses() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_millis(50),
        });
        cb.record_failure().await;
        let (allowed, _) = cb.can_execute().await;
        assert!(!allowed);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let (allowed, transition) = cb.can_execute().await;
        assert!(allowed);
        assert_eq!(transition.unwrap().new, CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn half_open_closes_on_one_success_reopens_on_one_failure() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_millis(10),
        });
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        cb.can_execute().await;
        assert_eq!(cb.get_state().await, CircuitState::HalfOpen);

        let transition = cb.record_success().await.unwrap();
        assert_eq!(transition.new, CircuitState::Closed);

        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        cb.can_execute().await;
        let transition = cb.record_failure().await.unwrap();
        assert_eq!(transition.new, CircuitState::Open);
    }

    #[tokio::test]
    async fn success_in_closed_state_resets_failure_counter() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        });
        cb.record_failure().await;
        cb.record_failure().await;
        cb.record_success().await;
        assert_eq!(cb.get_stats().await.consecutive_failures, 0);
    }
}
