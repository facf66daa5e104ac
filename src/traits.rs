//! Provider adapter trait.
//!
//! # WHY: Trait-Based Provider Abstraction
//!
//! The router only ever sees `Arc<dyn AIProvider>`, so:
//! - **Testing**: `MockProvider` replaces real backends without API calls
//! - **Fallback**: any adapter can stand in for any other
//! - **Translation**: each adapter maps the generic [`AIRequest`] onto its
//!   backend's native call shape (messages, system prompt, parameters)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{AIRequest, TaskType};

/// Raw result of one adapter call, before the router scores and prices it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutput {
    /// Generated text.
    pub content: String,

    /// Tokens consumed (prompt + completion).
    pub tokens_used: u64,

    /// Model that produced the text.
    pub model: String,
}

impl ProviderOutput {
    /// Create a new output.
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tokens_used: 0,
            model: model.into(),
        }
    }

    /// Set token usage.
    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = tokens;
        self
    }
}

/// An AI backend reachable through a uniform call.
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Provider id, matching its [`ProviderDescriptor`](crate::ProviderDescriptor).
    fn id(&self) -> &str;

    /// Model this adapter calls.
    fn model(&self) -> &str;

    /// Perform the request against the backend.
    async fn invoke(&self, request: &AIRequest) -> Result<ProviderOutput>;
}

/// Task-specific system prompt used by chat-style adapters.
pub fn system_prompt(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Learning => {
            "You are an expert tutor. Explain concepts clearly, cite the relevant \
             section of any standard or regulation you rely on, and check understanding."
        }
        TaskType::QuestionGeneration => {
            "You write assessment questions. Produce clear, unambiguous questions \
             with a single correct answer and brief explanations."
        }
        TaskType::Code => {
            "You are a senior software engineer. Answer with working code in fenced \
             code blocks followed by a short explanation."
        }
        TaskType::Analysis => {
            "You are a business analyst. Provide a structured analysis with findings, \
             risks and recommendations."
        }
        TaskType::Creative => "You are a creative writer. Be original and vivid.",
        TaskType::Reasoning => {
            "Reason step by step and state your conclusion explicitly at the end."
        }
        TaskType::Chat | TaskType::Generation | TaskType::Unknown => {
            "You are a helpful assistant for a business management platform."
        }
    }
}

/// Rough token estimate used by adapters whose backend reports no usage.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(4)
}
