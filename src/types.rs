//! Request, response and provider description types.
//!
//! All types map 1:1 onto snake_case JSON so route handlers can pass them
//! straight through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

/// Provider id reported when no provider served a request.
pub const NO_PROVIDER: &str = "none";

/// Value of `preferred_provider` meaning "let the router decide".
pub const AUTO_PROVIDER: &str = "auto";

/// Smart-code marker for requests that must never be cached.
pub const REALTIME_MARKER: &str = "REALTIME";

// ============================================================================
// Task and capability tags
// ============================================================================

/// Kind of work an [`AIRequest`] asks for. Drives provider preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Learning,
    QuestionGeneration,
    Code,
    Analysis,
    Creative,
    Reasoning,
    Chat,
    Generation,
    /// Any task type this router does not know about.
    #[serde(other)]
    Unknown,
}

impl TaskType {
    /// All known task types, excluding [`TaskType::Unknown`].
    pub const ALL: [TaskType; 8] = [
        TaskType::Learning,
        TaskType::QuestionGeneration,
        TaskType::Code,
        TaskType::Analysis,
        TaskType::Creative,
        TaskType::Reasoning,
        TaskType::Chat,
        TaskType::Generation,
    ];

    /// Wire name of the task type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Learning => "learning",
            TaskType::QuestionGeneration => "question_generation",
            TaskType::Code => "code",
            TaskType::Analysis => "analysis",
            TaskType::Creative => "creative",
            TaskType::Reasoning => "reasoning",
            TaskType::Chat => "chat",
            TaskType::Generation => "generation",
            TaskType::Unknown => "unknown",
        }
    }

    /// Parse a task type leniently; unrecognised names map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "learning" => TaskType::Learning,
            "question_generation" => TaskType::QuestionGeneration,
            "code" => TaskType::Code,
            "analysis" => TaskType::Analysis,
            "creative" => TaskType::Creative,
            "reasoning" => TaskType::Reasoning,
            "chat" => TaskType::Chat,
            "generation" => TaskType::Generation,
            _ => TaskType::Unknown,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability tags advertised by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Chat,
    Code,
    Analysis,
    Creative,
    Reasoning,
    Multimodal,
}

/// Health of a provider as reported on responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    #[default]
    Available,
    Degraded,
    Unavailable,
}

// ============================================================================
// Provider descriptor
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    100
}

/// Static configuration of one AI backend.
///
/// Only `available` changes after startup, and only through
/// [`ProviderRegistry`](crate::ProviderRegistry).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderDescriptor {
    /// Unique provider id (e.g. "openai").
    pub id: String,

    /// Human-readable name.
    #[serde(default)]
    pub display_name: String,

    /// Display rank for [`ProviderRegistry::descriptors`](crate::ProviderRegistry::descriptors),
    /// lower first. Informational only: routing uses the task table and
    /// registration order.
    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Supported capability tags.
    #[serde(default)]
    pub capabilities: Vec<Capability>,

    /// Estimated cost per token (USD).
    #[serde(default)]
    pub cost_per_token: f64,

    /// Maximum token window.
    #[serde(default)]
    pub max_tokens: usize,

    /// Model name reported as `model_used`.
    #[serde(default)]
    pub model: String,

    /// Additive confidence bonus for responses from this provider.
    #[serde(default)]
    pub confidence_bonus: f64,

    /// Per-call deadline in milliseconds; falls back to the router default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Whether the provider starts out available.
    #[serde(default = "default_true")]
    pub available: bool,
}

impl ProviderDescriptor {
    /// Create a descriptor with neutral defaults.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            priority: default_priority(),
            capabilities: vec![Capability::Chat],
            cost_per_token: 0.0,
            max_tokens: 4096,
            model: String::new(),
            confidence_bonus: 0.0,
            timeout_ms: None,
            available: true,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_cost_per_token(mut self, cost: f64) -> Self {
        self.cost_per_token = cost;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_confidence_bonus(mut self, bonus: f64) -> Self {
        self.confidence_bonus = bonus;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Check whether the provider advertises a capability.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

// ============================================================================
// Request
// ============================================================================

/// Free-form per-request options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestOptions {
    /// Response format hint (e.g. "json_object").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,

    /// Per-call deadline override in milliseconds.
    #[serde(default, alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Anything else the caller passed along.
    #[serde(flatten)]
    pub extra: HashMap<String, JsonValue>,
}

/// A normalized AI task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AIRequest {
    /// Opaque classification tag, e.g. `HERA.AI.CHAT.COMPLETION.v1`.
    pub smart_code: String,

    pub task_type: TaskType,

    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Explicit provider id, or `"auto"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_provider: Option<String>,

    #[serde(default = "default_true")]
    pub fallback_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<RequestOptions>,
}

impl AIRequest {
    /// Create a request with fallback enabled and no preference.
    pub fn new(smart_code: impl Into<String>, task_type: TaskType, prompt: impl Into<String>) -> Self {
        Self {
            smart_code: smart_code.into(),
            task_type,
            prompt: prompt.into(),
            context: None,
            max_tokens: None,
            temperature: None,
            preferred_provider: None,
            fallback_enabled: true,
            organization_id: None,
            user_id: None,
            options: None,
        }
    }

    pub fn with_context(mut self, context: JsonValue) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_preferred_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// The explicitly preferred provider, ignoring `"auto"` and blanks.
    pub fn preferred(&self) -> Option<&str> {
        self.preferred_provider
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case(AUTO_PROVIDER))
    }

    /// Realtime requests are never cached.
    pub fn is_realtime(&self) -> bool {
        self.smart_code.contains(REALTIME_MARKER)
    }

    /// Per-call timeout requested through `options`.
    pub fn timeout_ms(&self) -> Option<u64> {
        self.options.as_ref().and_then(|o| o.timeout_ms)
    }

    /// Requested response format, if any.
    pub fn response_format(&self) -> Option<&str> {
        self.options
            .as_ref()
            .and_then(|o| o.response_format.as_deref())
    }
}

// ============================================================================
// Response
// ============================================================================

/// Uniform outcome of processing an [`AIRequest`].
///
/// `response` is present iff `success`; `error` is present iff `!success`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AIResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Provider id that served the request, or `"none"`.
    pub provider_used: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<bool>,

    /// Number of failed provider calls before this outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_attempts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,

    #[serde(default)]
    pub provider_status: ProviderStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Served from the response cache.
    #[serde(default)]
    pub cached: bool,

    pub smart_code: String,

    pub timestamp: DateTime<Utc>,
}

impl AIResponse {
    /// Build a successful response. Metrics are filled in with the `with_*`
    /// setters.
    pub fn success(
        smart_code: impl Into<String>,
        provider: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            response: Some(content.into()),
            provider_used: provider.into(),
            tokens_used: None,
            cost_estimate: None,
            confidence_score: None,
            processing_time_ms: None,
            fallback_used: Some(false),
            fallback_attempts: Some(0),
            model_used: None,
            provider_status: ProviderStatus::Available,
            success_rate: None,
            error: None,
            cached: false,
            smart_code: smart_code.into(),
            timestamp: Utc::now(),
        }
    }

    /// Build a failure response with `provider_used = "none"`.
    pub fn failure(smart_code: impl Into<String>, error: impl Into<String>, attempts: u32) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "AI request failed".to_string();
        }
        Self {
            success: false,
            response: None,
            provider_used: NO_PROVIDER.to_string(),
            tokens_used: None,
            cost_estimate: None,
            confidence_score: None,
            processing_time_ms: None,
            fallback_used: Some(attempts > 1),
            fallback_attempts: Some(attempts),
            model_used: None,
            provider_status: ProviderStatus::Unavailable,
            success_rate: None,
            error: Some(error),
            cached: false,
            smart_code: smart_code.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost_estimate = Some(cost);
        self
    }

    pub fn with_confidence(mut self, score: f64) -> Self {
        self.confidence_score = Some(score);
        self
    }

    pub fn with_processing_time_ms(mut self, ms: u64) -> Self {
        self.processing_time_ms = Some(ms);
        self
    }

    pub fn with_fallback(mut self, used: bool, attempts: u32) -> Self {
        self.fallback_used = Some(used);
        self.fallback_attempts = Some(attempts);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_used = Some(model.into());
        self
    }

    pub fn with_provider_health(mut self, status: ProviderStatus, success_rate: Option<f64>) -> Self {
        self.provider_status = status;
        self.success_rate = success_rate;
        self
    }

    /// Text of a successful response, empty on failure.
    pub fn text(&self) -> &str {
        self.response.as_deref().unwrap_or("")
    }
}

/// One event of [`AIRequestRouter::process_stream`](crate::AIRequestRouter::process_stream).
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// A word of the response text, with its trailing separator.
    Content(String),
    /// The finished response; always the last item.
    Done(Box<AIResponse>),
}
