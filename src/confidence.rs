//! Confidence scoring for successful responses.
//!
//! The default scorer is a fixed heuristic of additive bonuses; it is kept
//! exactly as-is for behavioral compatibility. Swap it through
//! [`ConfidenceScorer`] without touching the router.

use crate::types::{ProviderDescriptor, TaskType};

/// Starting score before any bonus.
pub const BASE_CONFIDENCE: f64 = 0.5;

/// Responses longer than this many characters earn [`CONTENT_BONUS`].
pub const LONG_RESPONSE_CHARS: usize = 100;

/// Size of each content-quality bonus.
pub const CONTENT_BONUS: f64 = 0.1;

/// Computes a heuristic quality estimate in `[0, 1]`.
pub trait ConfidenceScorer: Send + Sync {
    /// Score a response produced by `provider` for a task of `task_type`.
    fn score(&self, provider: &ProviderDescriptor, task_type: TaskType, response: &str) -> f64;
}

/// The built-in heuristic.
///
/// `0.5 + provider bonus`, plus `0.1` for each of:
/// - response longer than 100 characters
/// - `learning` task and the text contains `"Section"`
/// - `code` task and the text contains a code fence
/// - `analysis` task and the text contains `"analysis"`
///
/// clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConfidenceScorer;

impl ConfidenceScorer for DefaultConfidenceScorer {
    fn score(&self, provider: &ProviderDescriptor, task_type: TaskType, response: &str) -> f64 {
        let mut score = BASE_CONFIDENCE + provider.confidence_bonus;

        if response.chars().count() > LONG_RESPONSE_CHARS {
            score += CONTENT_BONUS;
        }

        let grounded = match task_type {
            TaskType::Learning => response.contains("Section"),
            TaskType::Code => response.contains("```"),
            TaskType::Analysis => response.contains("analysis"),
            _ => false,
        };
        if grounded {
            score += CONTENT_BONUS;
        }

        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(bonus: f64) -> ProviderDescriptor {
        ProviderDescriptor::new("p").with_confidence_bonus(bonus)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_base_score() {
        let score = DefaultConfidenceScorer.score(&provider(0.0), TaskType::Chat, "short");
        assert!(approx(score, 0.5));
    }

    #[test]
    fn test_provider_bonus_applies() {
        let score = DefaultConfidenceScorer.score(&provider(0.2), TaskType::Chat, "short");
        assert!(approx(score, 0.7));

        let score = DefaultConfidenceScorer.score(&provider(-0.1), TaskType::Chat, "short");
        assert!(approx(score, 0.4));
    }

    #[test]
    fn test_length_threshold_is_strict() {
        let exactly = "a".repeat(100);
        let over = "a".repeat(101);
        let s1 = DefaultConfidenceScorer.score(&provider(0.0), TaskType::Chat, &exactly);
        let s2 = DefaultConfidenceScorer.score(&provider(0.0), TaskType::Chat, &over);
        assert!(approx(s1, 0.5));
        assert!(approx(s2, 0.6));
    }

    #[test]
    fn test_task_specific_bonuses() {
        let p = provider(0.0);
        assert!(approx(DefaultConfidenceScorer.score(&p, TaskType::Learning, "See Section 4"), 0.6));
        assert!(approx(DefaultConfidenceScorer.score(&p, TaskType::Code, "```rust\n```"), 0.6));
        assert!(approx(DefaultConfidenceScorer.score(&p, TaskType::Analysis, "our analysis"), 0.6));
    }

    #[test]
    fn test_task_bonus_needs_matching_task() {
        let p = provider(0.0);
        assert!(approx(DefaultConfidenceScorer.score(&p, TaskType::Chat, "Section ```analysis"), 0.5));
        // Case-sensitive match.
        assert!(approx(DefaultConfidenceScorer.score(&p, TaskType::Analysis, "Analysis"), 0.5));
    }

    #[test]
    fn test_score_is_clamped() {
        let long_code = format!("```{}```", "x".repeat(200));
        let high = DefaultConfidenceScorer.score(&provider(0.9), TaskType::Code, &long_code);
        assert!(approx(high, 1.0));

        let low = DefaultConfidenceScorer.score(&provider(-2.0), TaskType::Chat, "x");
        assert!(approx(low, 0.0));
    }
}
