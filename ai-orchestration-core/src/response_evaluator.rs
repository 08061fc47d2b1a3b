//! # ResponseEvaluator
//!
//! Heuristic quality scoring for a produced completion. No
//! semantic classifier, no training data — by design.
//! The score starts at 0.5 and is nudged by a fixed table of surface-level
//! signals, then clamped to `[0,1]`.

use crate::models::Complexity;

const UNCERTAINTY_PHRASES: &[&str] = &[
    "not sure",
    "don't know",
    "cannot determine",
    "unclear",
    "i'm unsure",
    "hard to say",
];

const REFUSAL_PHRASES: &[&str] = &["i can't help", "as an ai", "i'm an ai"];

pub struct ResponseEvaluator;

impl ResponseEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Minimum quality score below which a response at `complexity` should
    /// be escalated to the next tier.
    pub fn escalation_threshold(complexity: Complexity) -> f64 {
        match complexity {
            Complexity::Trivial => 0.1,
            Complexity::Simple => 0.2,
            Complexity::Standard => 0.4,
            Complexity::Complex => 0.55,
            Complexity::Critical => 0.7,
        }
    }

    /// Applies the heuristic scoring table's adjustments in order.
    /// Case-insensitive substring matching throughout, mirroring the
    /// string-matching style used elsewhere in this corpus for closed-set
    /// detection over free text.
    pub fn score(&self, query: &str, content: &str) -> f64 {
        let mut score = 0.5_f64;
        let lower = content.to_lowercase();

        if content.len() < 20 && query.len() > 100 {
            score -= 0.3;
        }

        if content.len() as f64 >= 0.3 * query.len() as f64 {
            score += 0.15;
        }

        for phrase in UNCERTAINTY_PHRASES {
            if lower.contains(phrase) {
                score -= 0.10;
            }
        }

        let trimmed = content.trim_start();
        let looks_like_json = trimmed.starts_with('{') || trimmed.starts_with('[');
        if looks_like_json {
            if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
                score += 0.15;
            } else {
                score -= 0.15;
            }
        }

        if content.contains("```") {
            score += 0.10;
        }

        for phrase in REFUSAL_PHRASES {
            if lower.contains(phrase) {
                score -= 0.30;
            }
        }

        score += assertive_marker_count(&lower) as f64 * 0.05;

        score.clamp(0.0, 1.0)
    }

    /// Whether this quality score warrants escalation. Only relevant if a
    /// higher tier exists, which the orchestrator checks separately before
    /// acting on this.
    pub fn should_escalate(&self, quality_score: f64, complexity: Complexity) -> bool {
        quality_score < Self::escalation_threshold(complexity)
    }
}

impl Default for ResponseEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts assertive markers: "here is", "the answer is", numbered-list items
/// ("1.", "2)"), and "step N". Each occurrence contributes independently per
/// "each" wording.
fn assertive_marker_count(lower: &str) -> usize {
    let mut count = 0;
    if lower.contains("here is") {
        count += 1;
    }
    if lower.contains("the answer is") {
        count += 1;
    }
    count += lower
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            let mut chars = line.chars();
            match chars.next() {
                Some(c) if c.is_ascii_digit() => {
                    let rest = chars.as_str();
                    rest.starts_with('.') || rest.starts_with(')')
                }
                _ => false,
            }
        })
        .count();
    count += lower.matches("step ").count();
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_score_is_half() {
        let eval = ResponseEvaluator::new();
        let score = eval.score("query of moderate length for testing purposes here", "a response of similar relative length to the query");
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn short_reply_to_long_query_is_penalized() {
        let eval = ResponseEvaluator::new();
        let query = "x".repeat(150);
        let score = eval.score(&query, "ok");
        assert!(score < 0.5);
    }

    #[test]
    fn uncertainty_phrases_lower_score() {
        let eval = ResponseEvaluator::new();
        let score = eval.score("question", "I'm not sure, it's unclear to me.");
        assert!(score < 0.5);
    }

    #[test]
    fn valid_json_response_is_rewarded() {
        let eval = ResponseEvaluator::new();
        let score = eval.score("question", "{\"answer\": 42}");
        let invalid = eval.score("question", "{not valid json");
        assert!(score > invalid);
    }

    #[test]
    fn refusal_phrase_penalizes_heavily() {
        let eval = ResponseEvaluator::new();
        let score = eval.score("question", "I can't help with that request.");
        assert!(score < 0.3);
    }

    #[test]
    fn assertive_markers_increase_score() {
        let eval = ResponseEvaluator::new();
        let plain = eval.score("question", "maybe this works in some cases depending on context");
        let assertive = eval.score("question", "Here is the answer: the answer is 42.");
        assert!(assertive > plain);
    }

    #[test]
    fn escalation_thresholds_match_table() {
        assert_eq!(ResponseEvaluator::escalation_threshold(Complexity::Trivial), 0.1);
        assert_eq!(ResponseEvaluator::escalation_threshold(Complexity::Critical), 0.7);
    }

    #[test]
    fn should_escalate_compares_against_threshold() {
        let eval = ResponseEvaluator::new();
        assert!(eval.should_escalate(0.3, Complexity::Standard));
        assert!(!eval.should_escalate(0.6, Complexity::Standard));
    }
}
