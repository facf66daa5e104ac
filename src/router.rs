//! The request router.
//!
//! ```text
//! AIRequest
//!    │ middleware.before
//!    │ empty prompt? ──────────────────────────────► failure
//!    │ cache hit? (non-REALTIME) ──────────────────► cached response
//!    ▼
//! select_provider ── none available ──────────────► failure ("none")
//!    ▼
//! candidates: primary, task preference order, registration order
//!    │
//!    ├─► invoke (deadline + cancellation) ── ok ──► score, price, cache ─► success
//!    │        └── err ── fallback enabled? ── yes ─► next candidate
//!    │                          └── no ──────────────────────────────────► failure
//!    ▼
//! exhausted ───────────────────────────────────────► failure (last error)
//!    │ middleware.after
//! AIResponse
//! ```
//!
//! [`AIRequestRouter::process_request`] never returns an error and never
//! panics: every failure, including a panicking adapter, comes back as a
//! failure-shaped [`AIResponse`].

use futures::future::{join_all, ready};
use futures::stream::{self, BoxStream, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::cache::{fingerprint, CacheConfig, CacheStats, ResponseCache};
use crate::confidence::{ConfidenceScorer, DefaultConfidenceScorer};
use crate::config::RouterConfig;
use crate::cost_tracker::estimate_cost;
use crate::error::{Result, RouterError};
use crate::factory::ProviderFactory;
use crate::metrics::{ProviderHealth, ProviderStats, DEFAULT_DEGRADED_THRESHOLD};
use crate::middleware::{RouterMiddleware, RouterMiddlewareStack};
use crate::registry::ProviderRegistry;
use crate::routing::RoutingTable;
use crate::traits::{AIProvider, ProviderOutput};
use crate::types::{AIRequest, AIResponse, ProviderDescriptor, StreamChunk};

/// Per-call deadline when nothing else sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Routes AI requests across providers with fallback.
///
/// Cheap to clone; clones share the registry, cache and counters.
#[derive(Clone)]
pub struct AIRequestRouter {
    registry: Arc<ProviderRegistry>,
    routing: Arc<RoutingTable>,
    cache: Arc<ResponseCache>,
    scorer: Arc<dyn ConfidenceScorer>,
    middleware: Arc<RouterMiddlewareStack>,
    stats: Arc<ProviderStats>,
    default_timeout: Duration,
    stream_word_delay: Duration,
}

impl fmt::Debug for AIRequestRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AIRequestRouter")
            .field("registry", &self.registry)
            .field("routing", &self.routing)
            .field("cache", self.cache.config())
            .field("middleware", &self.middleware)
            .field("default_timeout", &self.default_timeout)
            .field("stream_word_delay", &self.stream_word_delay)
            .finish()
    }
}

impl AIRequestRouter {
    /// Start building a router around a registry.
    pub fn builder(registry: Arc<ProviderRegistry>) -> AIRequestRouterBuilder {
        AIRequestRouterBuilder::new(registry)
    }

    /// Build a router from configuration.
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        ProviderFactory::build_router(config)
    }

    /// Build a router from the configuration found by [`RouterConfig::load`].
    pub fn from_env() -> Result<Self> {
        ProviderFactory::from_env()
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Call counters of one provider.
    pub fn provider_health(&self, id: &str) -> ProviderHealth {
        self.stats.health(id)
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Pick the primary provider for a request.
    ///
    /// An available preferred provider wins, then the first available entry
    /// of the task's preference order, then the first available provider in
    /// registration order. `None` means every provider is down.
    pub fn select_provider(&self, request: &AIRequest) -> Option<String> {
        if let Some(preferred) = request.preferred() {
            if self.registry.is_available(preferred) {
                return Some(preferred.to_string());
            }
            debug!(preferred, "Preferred provider unavailable");
        }

        if let Some(id) = self
            .routing
            .preferred_order(request.task_type)
            .iter()
            .find(|id| self.registry.is_available(id))
        {
            return Some(id.clone());
        }

        self.registry.available_ids().into_iter().next()
    }

    /// Ordered, deduplicated providers to try. Only the primary when
    /// fallback is disabled.
    fn candidates(&self, primary: &str, request: &AIRequest) -> Vec<String> {
        let mut order = vec![primary.to_string()];
        if !request.fallback_enabled {
            return order;
        }

        let rest = self
            .routing
            .preferred_order(request.task_type)
            .iter()
            .cloned()
            .chain(self.registry.ids());

        for id in rest {
            if !order.contains(&id) && self.registry.is_available(&id) {
                order.push(id);
            }
        }
        order
    }

    fn call_timeout(&self, request: &AIRequest, descriptor: &ProviderDescriptor) -> Duration {
        request
            .timeout_ms()
            .or(descriptor.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout)
    }

    // ------------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------------

    /// Process one request.
    pub async fn process_request(&self, request: &AIRequest) -> AIResponse {
        self.process_request_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Process one request, stopping early when `cancel` fires.
    ///
    /// Cancellation is checked before each attempt and raced against the
    /// in-flight provider call.
    pub async fn process_request_with_cancel(
        &self,
        request: &AIRequest,
        cancel: CancellationToken,
    ) -> AIResponse {
        let started = Instant::now();

        let outcome = AssertUnwindSafe(self.route(request, &cancel, started))
            .catch_unwind()
            .await;

        let mut response = match outcome {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(smart_code = %request.smart_code, panic = %message, "Router panicked");
                AIResponse::failure(
                    request.smart_code.clone(),
                    RouterError::Internal(message).to_string(),
                    0,
                )
            }
        };

        if response.processing_time_ms.is_none() {
            response.processing_time_ms = Some(elapsed_ms(started));
        }

        if AssertUnwindSafe(self.middleware.after(request, &response))
            .catch_unwind()
            .await
            .is_err()
        {
            error!(smart_code = %request.smart_code, "Middleware after hook panicked");
        }

        response
    }

    async fn route(
        &self,
        request: &AIRequest,
        cancel: &CancellationToken,
        started: Instant,
    ) -> AIResponse {
        let smart_code = request.smart_code.clone();

        if let Err(e) = self.middleware.before(request).await {
            debug!(smart_code = %smart_code, error = %e, "Request rejected by middleware");
            return AIResponse::failure(smart_code, e.to_string(), 0);
        }

        if request.prompt.trim().is_empty() {
            let err = RouterError::InvalidRequest("prompt must not be empty".into());
            return AIResponse::failure(smart_code, err.to_string(), 0);
        }

        let cache_key = (!request.is_realtime()).then(|| fingerprint(request));
        if let Some(key) = &cache_key {
            if let Some(mut hit) = self.cache.get(key).await {
                debug!(smart_code = %smart_code, key = %key, "Cache hit");
                hit.cached = true;
                hit.fallback_used = Some(false);
                hit.fallback_attempts = Some(0);
                hit.processing_time_ms = Some(elapsed_ms(started));
                return hit;
            }
        }

        let Some(primary) = self.select_provider(request) else {
            warn!(smart_code = %smart_code, task_type = %request.task_type, "No AI provider available");
            return AIResponse::failure(smart_code, RouterError::NoProviderAvailable.to_string(), 0);
        };

        let candidates = self.candidates(&primary, request);
        debug!(
            smart_code = %smart_code,
            task_type = %request.task_type,
            primary = %primary,
            candidates = ?candidates,
            "Routing request"
        );

        let mut attempts: u32 = 0;
        let mut last_error: Option<RouterError> = None;

        for id in &candidates {
            if cancel.is_cancelled() {
                last_error = Some(RouterError::Cancelled);
                break;
            }

            // Availability may have changed since the candidate list was built.
            let (Some(descriptor), Some(adapter)) =
                (self.registry.descriptor(id), self.registry.adapter(id))
            else {
                continue;
            };
            if !descriptor.available {
                debug!(provider = %id, "Skipping provider marked down");
                last_error = Some(RouterError::ProviderUnavailable(id.clone()));
                continue;
            }

            let timeout = self.call_timeout(request, &descriptor);
            let call_started = Instant::now();
            let result = invoke(adapter, request, timeout, cancel).await;
            let latency_ms = elapsed_ms(call_started);

            match result {
                Ok(output) => {
                    self.stats.record_success(id, latency_ms);
                    let response =
                        self.assemble(request, &descriptor, &primary, output, attempts, started);
                    if let Some(key) = cache_key {
                        self.cache.put(key, response.clone()).await;
                    }
                    return response;
                }
                Err(err) => {
                    self.stats.record_failure(id, latency_ms);
                    attempts += 1;
                    warn!(
                        provider = %id,
                        smart_code = %smart_code,
                        attempt = attempts,
                        duration_ms = latency_ms,
                        error = %err,
                        "Provider call failed"
                    );

                    let stop = matches!(err, RouterError::Cancelled) || !request.fallback_enabled;
                    last_error = Some(err);
                    if stop {
                        break;
                    }
                }
            }
        }

        let error = last_error.unwrap_or(RouterError::NoProviderAvailable);
        AIResponse::failure(smart_code, error.to_string(), attempts)
    }

    fn assemble(
        &self,
        request: &AIRequest,
        descriptor: &ProviderDescriptor,
        primary: &str,
        output: ProviderOutput,
        attempts: u32,
        started: Instant,
    ) -> AIResponse {
        let id = descriptor.id.as_str();
        let confidence = self
            .scorer
            .score(descriptor, request.task_type, &output.content)
            .clamp(0.0, 1.0);
        let cost = estimate_cost(output.tokens_used, descriptor.cost_per_token);
        let fallback_used = id != primary || request.preferred().is_some_and(|p| p != id);
        let status = self.stats.status(id, self.registry.is_available(id));
        let model = if output.model.is_empty() {
            descriptor.model.clone()
        } else {
            output.model
        };

        AIResponse::success(request.smart_code.clone(), id, output.content)
            .with_tokens(output.tokens_used)
            .with_cost(cost)
            .with_confidence(confidence)
            .with_fallback(fallback_used, attempts)
            .with_model(model)
            .with_provider_health(status, self.stats.success_rate(id))
            .with_processing_time_ms(elapsed_ms(started))
    }

    /// Process requests concurrently. Results keep the input order and one
    /// request's failure never affects another.
    pub async fn process_batch(&self, requests: &[AIRequest]) -> Vec<AIResponse> {
        join_all(requests.iter().map(|r| self.process_request(r))).await
    }

    /// Process a request, then replay its text word by word.
    ///
    /// This buffers the full response before emitting anything; it is not
    /// backend streaming. A failed request yields only [`StreamChunk::Done`].
    pub fn process_stream(&self, request: AIRequest) -> BoxStream<'static, StreamChunk> {
        let router = self.clone();
        let delay = self.stream_word_delay;

        stream::once(async move { router.process_request(&request).await })
            .flat_map(move |response| {
                let words: Vec<String> = if response.success {
                    response
                        .text()
                        .split_inclusive(char::is_whitespace)
                        .map(str::to_string)
                        .collect()
                } else {
                    Vec::new()
                };

                stream::iter(words)
                    .then(move |word| async move {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        StreamChunk::Content(word)
                    })
                    .chain(stream::once(ready(StreamChunk::Done(Box::new(response)))))
            })
            .boxed()
    }
}

async fn invoke(
    adapter: Arc<dyn AIProvider>,
    request: &AIRequest,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProviderOutput> {
    let call = AssertUnwindSafe(adapter.invoke(request)).catch_unwind();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RouterError::Cancelled),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Err(_) => Err(RouterError::Timeout(timeout.as_millis() as u64)),
            Ok(Err(panic)) => Err(RouterError::Internal(format!(
                "provider panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Ok(Ok(result)) => result,
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`AIRequestRouter`].
pub struct AIRequestRouterBuilder {
    registry: Arc<ProviderRegistry>,
    routing: RoutingTable,
    cache: CacheConfig,
    scorer: Arc<dyn ConfidenceScorer>,
    middleware: RouterMiddlewareStack,
    default_timeout: Duration,
    stream_word_delay: Duration,
    degraded_threshold: f64,
}

impl AIRequestRouterBuilder {
    /// Defaults: built-in routing table, default cache, default scorer, no
    /// middleware.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            routing: RoutingTable::builtin(),
            cache: CacheConfig::default(),
            scorer: Arc::new(DefaultConfidenceScorer),
            middleware: RouterMiddlewareStack::new(),
            default_timeout: DEFAULT_TIMEOUT,
            stream_word_delay: Duration::ZERO,
            degraded_threshold: DEFAULT_DEGRADED_THRESHOLD,
        }
    }

    pub fn routing(mut self, routing: RoutingTable) -> Self {
        self.routing = routing;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn scorer(mut self, scorer: Arc<dyn ConfidenceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Append a middleware.
    pub fn middleware(mut self, middleware: Arc<dyn RouterMiddleware>) -> Self {
        self.middleware.add(middleware);
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn stream_word_delay(mut self, delay: Duration) -> Self {
        self.stream_word_delay = delay;
        self
    }

    pub fn degraded_threshold(mut self, threshold: f64) -> Self {
        self.degraded_threshold = threshold;
        self
    }

    pub fn build(self) -> AIRequestRouter {
        AIRequestRouter {
            registry: self.registry,
            routing: Arc::new(self.routing),
            cache: Arc::new(ResponseCache::new(self.cache)),
            scorer: self.scorer,
            middleware: Arc::new(self.middleware),
            stats: Arc::new(ProviderStats::new(self.degraded_threshold)),
            default_timeout: self.default_timeout,
            stream_word_delay: self.stream_word_delay,
        }
    }
}
