//! Router middleware.
//!
//! Hooks around every processed request, used for cross-cutting concerns like
//! logging, metrics and cost tracking.
//!
//! ```text
//!   AIRequest ──► before(1) ──► before(2) ──► routing + provider calls
//!                                                      │
//!   AIResponse ◄── after(1) ◄── after(2) ◄─────────────┘
//! ```
//!
//! - `before` runs in registration order. An error aborts the request, which
//!   is then answered with a failure response.
//! - `after` runs in reverse order for every outcome: success, failure and
//!   cache hit. Its errors are logged and otherwise ignored.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use hera_ai_router::middleware::{LoggingMiddleware, MetricsMiddleware, RouterMiddlewareStack};
//!
//! let metrics = Arc::new(MetricsMiddleware::new());
//! let mut stack = RouterMiddlewareStack::new();
//! stack.add(Arc::new(LoggingMiddleware::new()));
//! stack.add(metrics.clone());
//! assert_eq!(stack.len(), 2);
//! ```

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::cost_tracker::{UsageSummary, UsageTracker};
use crate::error::Result;
use crate::types::{AIRequest, AIResponse};

// ============================================================================
// Middleware Trait
// ============================================================================

/// Hooks around request processing.
#[async_trait]
pub trait RouterMiddleware: Send + Sync {
    /// Middleware name for logging.
    fn name(&self) -> &str;

    /// Called before routing. Return `Err` to reject the request.
    async fn before(&self, request: &AIRequest) -> Result<()> {
        let _ = request;
        Ok(())
    }

    /// Called with the final response.
    async fn after(&self, request: &AIRequest, response: &AIResponse) -> Result<()> {
        let _ = (request, response);
        Ok(())
    }
}

// ============================================================================
// Middleware Stack
// ============================================================================

/// Ordered list of middlewares.
#[derive(Default, Clone)]
pub struct RouterMiddlewareStack {
    middlewares: Vec<Arc<dyn RouterMiddleware>>,
}

impl RouterMiddlewareStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware.
    pub fn add(&mut self, middleware: Arc<dyn RouterMiddleware>) {
        self.middlewares.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Run every `before` hook in registration order, stopping at the first
    /// error.
    pub async fn before(&self, request: &AIRequest) -> Result<()> {
        for middleware in &self.middlewares {
            middleware.before(request).await?;
        }
        Ok(())
    }

    /// Run every `after` hook in reverse order. Errors are logged.
    pub async fn after(&self, request: &AIRequest, response: &AIResponse) {
        for middleware in self.middlewares.iter().rev() {
            if let Err(e) = middleware.after(request, response).await {
                warn!(
                    middleware = middleware.name(),
                    smart_code = %request.smart_code,
                    error = %e,
                    "Middleware after hook failed"
                );
            }
        }
    }
}

impl fmt::Debug for RouterMiddlewareStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterMiddlewareStack")
            .field("middlewares", &self.names())
            .finish()
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Log level for [`LoggingMiddleware`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Request/response summary.
    #[default]
    Info,
    /// Adds prompt and response previews.
    Debug,
    /// Full request and response.
    Trace,
}

/// Logs every request and its outcome.
#[derive(Debug, Default)]
pub struct LoggingMiddleware {
    log_level: LogLevel,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: LogLevel) -> Self {
        Self { log_level: level }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

#[async_trait]
impl RouterMiddleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn before(&self, request: &AIRequest) -> Result<()> {
        match self.log_level {
            LogLevel::Info => {
                info!(
                    smart_code = %request.smart_code,
                    task_type = %request.task_type,
                    preferred = ?request.preferred(),
                    fallback = request.fallback_enabled,
                    "[AI] Request"
                );
            }
            LogLevel::Debug => {
                debug!(
                    smart_code = %request.smart_code,
                    task_type = %request.task_type,
                    preferred = ?request.preferred(),
                    fallback = request.fallback_enabled,
                    organization_id = ?request.organization_id,
                    prompt_preview = %preview(&request.prompt, 100),
                    "[AI] Request"
                );
            }
            LogLevel::Trace => {
                trace!(request = ?request, "[AI] Full request");
            }
        }
        Ok(())
    }

    async fn after(&self, request: &AIRequest, response: &AIResponse) -> Result<()> {
        match self.log_level {
            LogLevel::Info => {
                info!(
                    smart_code = %request.smart_code,
                    success = response.success,
                    provider = %response.provider_used,
                    cached = response.cached,
                    fallback_used = ?response.fallback_used,
                    tokens = ?response.tokens_used,
                    duration_ms = ?response.processing_time_ms,
                    "[AI] Response"
                );
            }
            LogLevel::Debug => {
                debug!(
                    smart_code = %request.smart_code,
                    success = response.success,
                    provider = %response.provider_used,
                    model = ?response.model_used,
                    cached = response.cached,
                    fallback_attempts = ?response.fallback_attempts,
                    confidence = ?response.confidence_score,
                    error = ?response.error,
                    content_preview = %preview(response.text(), 200),
                    "[AI] Response"
                );
            }
            LogLevel::Trace => {
                trace!(response = ?response, "[AI] Full response");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Counts requests and outcomes with atomics.
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    pub total_requests: AtomicU64,
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub cache_hits: AtomicU64,
    pub fallbacks: AtomicU64,
    pub total_tokens: AtomicU64,
    pub total_time_ms: AtomicU64,
}

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn get_summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            total_time_ms: self.total_time_ms.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl RouterMiddleware for MetricsMiddleware {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn after(&self, _request: &AIRequest, response: &AIResponse) -> Result<()> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if response.success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if response.cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        if response.fallback_used == Some(true) {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        self.total_tokens
            .fetch_add(response.tokens_used.unwrap_or(0), Ordering::Relaxed);
        self.total_time_ms
            .fetch_add(response.processing_time_ms.unwrap_or(0), Ordering::Relaxed);
        Ok(())
    }
}

/// Snapshot of [`MetricsMiddleware`] counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub fallbacks: u64,
    pub total_tokens: u64,
    pub total_time_ms: u64,
}

impl MetricsSummary {
    /// Fraction of successful requests.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_requests as f64
        }
    }

    /// Fraction of requests answered from the cache.
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_time_ms as f64 / self.total_requests as f64
        }
    }
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests ({:.0}% ok, {} cached, {} fallbacks), {} tokens, avg {:.0}ms",
            self.total_requests,
            self.success_rate() * 100.0,
            self.cache_hits,
            self.fallbacks,
            self.total_tokens,
            self.average_latency_ms()
        )
    }
}

// ============================================================================
// Cost tracking
// ============================================================================

/// Feeds priced, non-cached responses into a [`UsageTracker`].
#[derive(Debug, Default)]
pub struct CostTrackingMiddleware {
    tracker: Mutex<UsageTracker>,
}

impl CostTrackingMiddleware {
    pub fn new(tracker: UsageTracker) -> Self {
        Self {
            tracker: Mutex::new(tracker),
        }
    }

    pub async fn summary(&self) -> UsageSummary {
        self.tracker.lock().await.summary()
    }

    pub async fn is_over_budget(&self) -> bool {
        self.tracker.lock().await.is_over_budget()
    }
}

#[async_trait]
impl RouterMiddleware for CostTrackingMiddleware {
    fn name(&self) -> &str {
        "cost_tracking"
    }

    async fn after(&self, request: &AIRequest, response: &AIResponse) -> Result<()> {
        if !response.success || response.cached {
            return Ok(());
        }
        let mut tracker = self.tracker.lock().await;
        tracker.record(
            response.provider_used.clone(),
            request.task_type.as_str(),
            response.tokens_used.unwrap_or(0),
            response.cost_estimate.unwrap_or(0.0),
        );
        if tracker.is_over_budget() {
            warn!(
                total_cost = tracker.total_cost(),
                "AI usage budget exceeded"
            );
        }
        Ok(())
    }
}
