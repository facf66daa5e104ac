//! Per-provider health counters.
//!
//! Each provider call (not cache hits) is recorded as a success or a failure.
//! The resulting success rate is reported on responses and drives
//! [`ProviderStatus`]:
//!
//! | Condition | Status |
//! |-----------|--------|
//! | availability flag down | `unavailable` |
//! | ≥ [`MIN_CALLS_FOR_STATUS`] calls and success rate below threshold | `degraded` |
//! | otherwise | `available` |

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::types::ProviderStatus;

/// Calls needed before a provider can be reported as degraded.
pub const MIN_CALLS_FOR_STATUS: u64 = 5;

/// Default success rate below which a provider is degraded.
pub const DEFAULT_DEGRADED_THRESHOLD: f64 = 0.8;

#[derive(Debug, Default)]
struct Counters {
    successes: AtomicU64,
    failures: AtomicU64,
    total_latency_ms: AtomicU64,
}

/// Point-in-time view of one provider's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHealth {
    pub provider: String,
    pub successes: u64,
    pub failures: u64,
    pub average_latency_ms: f64,
}

impl ProviderHealth {
    /// Total recorded calls.
    pub fn calls(&self) -> u64 {
        self.successes + self.failures
    }

    /// Fraction of successful calls, `None` before the first call.
    pub fn success_rate(&self) -> Option<f64> {
        let calls = self.calls();
        if calls == 0 {
            None
        } else {
            Some(self.successes as f64 / calls as f64)
        }
    }
}

/// Thread-safe success/failure counters keyed by provider id.
#[derive(Debug)]
pub struct ProviderStats {
    counters: RwLock<HashMap<String, Arc<Counters>>>,
    degraded_threshold: f64,
}

impl Default for ProviderStats {
    fn default() -> Self {
        Self::new(DEFAULT_DEGRADED_THRESHOLD)
    }
}

impl ProviderStats {
    /// Create counters with a degraded threshold in `[0, 1]`.
    pub fn new(degraded_threshold: f64) -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            degraded_threshold: degraded_threshold.clamp(0.0, 1.0),
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, provider: &str, latency_ms: u64) {
        let counters = self.counters_for(provider);
        counters.successes.fetch_add(1, Ordering::Relaxed);
        counters
            .total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Record a failed call.
    pub fn record_failure(&self, provider: &str, latency_ms: u64) {
        let counters = self.counters_for(provider);
        counters.failures.fetch_add(1, Ordering::Relaxed);
        counters
            .total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Snapshot of one provider's counters.
    pub fn health(&self, provider: &str) -> ProviderHealth {
        let counters = self
            .counters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(provider)
            .cloned();

        match counters {
            Some(c) => {
                let successes = c.successes.load(Ordering::Relaxed);
                let failures = c.failures.load(Ordering::Relaxed);
                let calls = successes + failures;
                let average_latency_ms = if calls == 0 {
                    0.0
                } else {
                    c.total_latency_ms.load(Ordering::Relaxed) as f64 / calls as f64
                };
                ProviderHealth {
                    provider: provider.to_string(),
                    successes,
                    failures,
                    average_latency_ms,
                }
            }
            None => ProviderHealth {
                provider: provider.to_string(),
                successes: 0,
                failures: 0,
                average_latency_ms: 0.0,
            },
        }
    }

    /// Success rate of a provider, `None` before the first call.
    pub fn success_rate(&self, provider: &str) -> Option<f64> {
        self.health(provider).success_rate()
    }

    /// Derive the reported status of a provider.
    pub fn status(&self, provider: &str, available: bool) -> ProviderStatus {
        if !available {
            return ProviderStatus::Unavailable;
        }
        let health = self.health(provider);
        match health.success_rate() {
            Some(rate) if health.calls() >= MIN_CALLS_FOR_STATUS && rate < self.degraded_threshold => {
                ProviderStatus::Degraded
            }
            _ => ProviderStatus::Available,
        }
    }

    /// Reset every counter.
    pub fn reset(&self) {
        self.counters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn counters_for(&self, provider: &str) -> Arc<Counters> {
        if let Some(c) = self
            .counters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(provider)
        {
            return c.clone();
        }

        self.counters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(provider.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_calls_means_no_rate() {
        let stats = ProviderStats::default();
        assert_eq!(stats.success_rate("openai"), None);
        assert_eq!(stats.status("openai", true), ProviderStatus::Available);
    }

    #[test]
    fn test_success_rate() {
        let stats = ProviderStats::default();
        stats.record_success("openai", 10);
        stats.record_success("openai", 20);
        stats.record_failure("openai", 30);
        stats.record_success("openai", 40);

        assert_eq!(stats.success_rate("openai"), Some(0.75));
        let health = stats.health("openai");
        assert_eq!(health.calls(), 4);
        assert_eq!(health.average_latency_ms, 25.0);
    }

    #[test]
    fn test_unavailable_overrides_rate() {
        let stats = ProviderStats::default();
        stats.record_success("a", 1);
        assert_eq!(stats.status("a", false), ProviderStatus::Unavailable);
    }

    #[test]
    fn test_degraded_needs_minimum_calls() {
        let stats = ProviderStats::default();
        for _ in 0..4 {
            stats.record_failure("a", 1);
        }
        assert_eq!(stats.status("a", true), ProviderStatus::Available);

        stats.record_failure("a", 1);
        assert_eq!(stats.status("a", true), ProviderStatus::Degraded);
    }

    #[test]
    fn test_healthy_provider_not_degraded() {
        let stats = ProviderStats::new(0.5);
        for _ in 0..6 {
            stats.record_success("a", 1);
        }
        stats.record_failure("a", 1);
        assert_eq!(stats.status("a", true), ProviderStatus::Available);
    }

    #[test]
    fn test_reset() {
        let stats = ProviderStats::default();
        stats.record_success("a", 1);
        stats.reset();
        assert_eq!(stats.health("a").calls(), 0);
    }
}
