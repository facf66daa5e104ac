//! Cost estimation and usage aggregation.
//!
//! Per-request cost is a flat `tokens_used × cost_per_token` estimate taken
//! from the serving provider's descriptor. [`UsageTracker`] aggregates those
//! estimates across a session, broken down by provider and task type.
//!
//! # Usage
//!
//! ```rust
//! use hera_ai_router::cost_tracker::{estimate_cost, UsageTracker};
//!
//! let mut tracker = UsageTracker::new().with_budget(1.0);
//! tracker.record("openai", "chat", 1200, estimate_cost(1200, 0.00002));
//!
//! let summary = tracker.summary();
//! assert_eq!(summary.call_count, 1);
//! assert!(!tracker.is_over_budget());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Estimated cost of a call.
pub fn estimate_cost(tokens_used: u64, cost_per_token: f64) -> f64 {
    tokens_used as f64 * cost_per_token
}

/// A single priced call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEntry {
    /// Provider that served the call.
    pub provider: String,

    /// Task type of the request.
    pub task_type: String,

    /// Tokens consumed.
    pub tokens: u64,

    /// Estimated cost in USD.
    pub cost: f64,

    /// When the call completed.
    pub timestamp: SystemTime,
}

/// Summary of usage across a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Total cost in USD.
    pub total_cost: f64,

    /// Total tokens.
    pub total_tokens: u64,

    /// Number of priced calls.
    pub call_count: usize,

    /// Average cost per call.
    pub avg_cost_per_call: f64,

    /// Cost by provider.
    pub by_provider: HashMap<String, f64>,

    /// Cost by task type.
    pub by_task: HashMap<String, f64>,
}

/// Session-level usage tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageTracker {
    entries: Vec<UsageEntry>,

    /// Optional budget limit in USD.
    budget_limit: Option<f64>,
}

impl UsageTracker {
    /// Create an empty tracker without a budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a budget limit in USD.
    pub fn with_budget(mut self, limit: f64) -> Self {
        self.budget_limit = Some(limit);
        self
    }

    /// Record a priced call.
    pub fn record(
        &mut self,
        provider: impl Into<String>,
        task_type: impl Into<String>,
        tokens: u64,
        cost: f64,
    ) {
        self.entries.push(UsageEntry {
            provider: provider.into(),
            task_type: task_type.into(),
            tokens,
            cost,
            timestamp: SystemTime::now(),
        });
    }

    /// Every recorded entry, oldest first.
    pub fn entries(&self) -> &[UsageEntry] {
        &self.entries
    }

    /// Total cost so far.
    pub fn total_cost(&self) -> f64 {
        self.entries.iter().map(|e| e.cost).sum()
    }

    /// Budget left, if a budget is set.
    pub fn remaining_budget(&self) -> Option<f64> {
        self.budget_limit.map(|limit| limit - self.total_cost())
    }

    /// Whether spend has exceeded the budget.
    pub fn is_over_budget(&self) -> bool {
        self.remaining_budget().map(|r| r < 0.0).unwrap_or(false)
    }

    /// Aggregate the recorded entries.
    pub fn summary(&self) -> UsageSummary {
        let mut summary = UsageSummary::default();

        for entry in &self.entries {
            summary.total_cost += entry.cost;
            summary.total_tokens += entry.tokens;
            summary.call_count += 1;
            *summary.by_provider.entry(entry.provider.clone()).or_default() += entry.cost;
            *summary.by_task.entry(entry.task_type.clone()).or_default() += entry.cost;
        }

        if summary.call_count > 0 {
            summary.avg_cost_per_call = summary.total_cost / summary.call_count as f64;
        }

        summary
    }

    /// Drop every entry, keeping the budget.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

/// Format a USD cost for display.
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${:.4}", cost)
    } else {
        format!("${:.2}", cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_cost() {
        assert_eq!(estimate_cost(0, 0.5), 0.0);
        assert!((estimate_cost(1000, 0.00002) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_summary_breakdowns() {
        let mut tracker = UsageTracker::new();
        tracker.record("openai", "chat", 100, 0.01);
        tracker.record("openai", "code", 200, 0.02);
        tracker.record("anthropic", "chat", 300, 0.03);

        let summary = tracker.summary();
        assert_eq!(summary.call_count, 3);
        assert_eq!(summary.total_tokens, 600);
        assert!((summary.total_cost - 0.06).abs() < 1e-12);
        assert!((summary.avg_cost_per_call - 0.02).abs() < 1e-12);
        assert!((summary.by_provider["openai"] - 0.03).abs() < 1e-12);
        assert!((summary.by_task["chat"] - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_empty_summary() {
        let summary = UsageTracker::new().summary();
        assert_eq!(summary.call_count, 0);
        assert_eq!(summary.avg_cost_per_call, 0.0);
    }

    #[test]
    fn test_budget() {
        let mut tracker = UsageTracker::new().with_budget(0.05);
        tracker.record("openai", "chat", 100, 0.04);
        assert!(!tracker.is_over_budget());

        tracker.record("openai", "chat", 100, 0.02);
        assert!(tracker.is_over_budget());

        tracker.reset();
        assert!(!tracker.is_over_budget());
        assert_eq!(tracker.remaining_budget(), Some(0.05));
    }

    #[test]
    fn test_no_budget_never_over() {
        let mut tracker = UsageTracker::new();
        tracker.record("x", "chat", 1, 1_000.0);
        assert!(!tracker.is_over_budget());
        assert!(tracker.remaining_budget().is_none());
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(0.001), "$0.0010");
        assert_eq!(format_cost(1.5), "$1.50");
    }
}
