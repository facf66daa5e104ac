//! HERA AI Router - task-aware provider routing with fallback
//!
//! Accepts a normalized AI task ([`AIRequest`]), picks a provider by explicit
//! preference, task type and availability, calls it, fails over to the other
//! providers, scores confidence, estimates cost and caches the result by
//! request fingerprint.
//!
//! # Components
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`router`] | `AIRequestRouter`: select, process, batch, stream |
//! | [`registry`] | Injected provider set with availability toggles |
//! | [`routing`] | Static task type → provider preference table |
//! | [`cache`] | Bounded TTL cache keyed by request fingerprint |
//! | [`confidence`] | Pluggable confidence scoring |
//! | [`metrics`] | Per-provider success rate and status |
//! | [`middleware`] | Logging, metrics and cost hooks |
//! | [`providers`] | OpenAI, simulated and mock adapters |
//! | [`config`] / [`factory`] | TOML configuration and router construction |
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hera_ai_router::{
//!     AIRequest, AIRequestRouter, MockProvider, ProviderDescriptor, ProviderRegistry, TaskType,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut registry = ProviderRegistry::new();
//! registry.register(ProviderDescriptor::new("openai"), Arc::new(MockProvider::new("openai")));
//! registry.register(ProviderDescriptor::new("anthropic"), Arc::new(MockProvider::new("anthropic")));
//!
//! let router = AIRequestRouter::builder(Arc::new(registry)).build();
//! let request = AIRequest::new("HERA.AI.ANALYSIS.REPORT.v1", TaskType::Analysis, "Summarize Q3");
//!
//! let response = router.process_request(&request).await;
//! assert!(response.success);
//! assert_eq!(response.provider_used, "anthropic");
//! # }
//! ```

pub mod cache;
pub mod confidence;
pub mod config;
pub mod cost_tracker;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod middleware;
pub mod providers;
pub mod registry;
pub mod router;
pub mod routing;
pub mod traits;
pub mod types;

pub use cache::{fingerprint, CacheConfig, CacheStats, ResponseCache};
pub use confidence::{ConfidenceScorer, DefaultConfidenceScorer};
pub use config::{ConfigError, ProviderConfig, ProviderKind, RouterConfig, RouterSettings};
pub use cost_tracker::{estimate_cost, format_cost, UsageEntry, UsageSummary, UsageTracker};
pub use error::{Result, RouterError};
pub use factory::ProviderFactory;
pub use metrics::{ProviderHealth, ProviderStats};
pub use middleware::{
    CostTrackingMiddleware, LogLevel, LoggingMiddleware, MetricsMiddleware, MetricsSummary,
    RouterMiddleware, RouterMiddlewareStack,
};
pub use providers::{MockProvider, MockReply, OpenAIProvider, SimulatedProvider};
pub use registry::ProviderRegistry;
pub use router::{AIRequestRouter, AIRequestRouterBuilder};
pub use routing::RoutingTable;
pub use traits::{AIProvider, ProviderOutput};
pub use types::{
    AIRequest, AIResponse, Capability, ProviderDescriptor, ProviderStatus, RequestOptions,
    StreamChunk, TaskType,
};
