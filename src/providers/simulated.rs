//! Deterministic stand-in for backends that are not wired to a real API.
//!
//! Used for `anthropic`, `gemini` and `local` in the default configuration.
//! Answers are shaped by task type so confidence scoring behaves as it would
//! against a real model, and token usage is a word count.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::traits::{AIProvider, ProviderOutput};
use crate::types::{AIRequest, TaskType};

/// Characters of the prompt echoed back in a simulated answer.
const PROMPT_EXCERPT_CHARS: usize = 80;

/// A provider that fabricates a plausible answer locally.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    id: String,
    model: String,
    latency: Duration,
}

impl SimulatedProvider {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            latency: Duration::ZERO,
        }
    }

    /// Artificial latency before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn render(&self, request: &AIRequest) -> String {
        let excerpt: String = request.prompt.chars().take(PROMPT_EXCERPT_CHARS).collect();
        let body = match request.task_type {
            TaskType::Learning => format!(
                "Section 1: Overview\n{excerpt}\n\nSection 2: Key points\nReview each concept and apply it to a worked example."
            ),
            TaskType::QuestionGeneration => format!(
                "1. What is the main idea of: {excerpt}?\n2. Give one practical example.\n3. Which assumption matters most?"
            ),
            TaskType::Code => format!("```\n// {excerpt}\n```\nThe snippet above sketches a solution."),
            TaskType::Analysis => format!(
                "Summary of the analysis: {excerpt}\nFindings, risks and recommendations follow from the data provided."
            ),
            TaskType::Creative => format!("Once upon a time, {excerpt}"),
            TaskType::Reasoning => format!("Step 1: restate the problem: {excerpt}\nConclusion: see above."),
            TaskType::Chat | TaskType::Generation | TaskType::Unknown => {
                format!("Here is a response to: {excerpt}")
            }
        };
        format!("[{}] {}", self.id, body)
    }
}

fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

#[async_trait]
impl AIProvider for SimulatedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &AIRequest) -> Result<ProviderOutput> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let content = self.render(request);
        let tokens = word_count(&request.prompt) + word_count(&content);
        debug!(provider = %self.id, tokens, "Simulated response");

        Ok(ProviderOutput::new(content, self.model.clone()).with_tokens(tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic() {
        let provider = SimulatedProvider::new("anthropic", "claude-sim");
        let req = AIRequest::new("X", TaskType::Chat, "hello there");

        let a = provider.invoke(&req).await.unwrap();
        let b = provider.invoke(&req).await.unwrap();
        assert_eq!(a, b);
        assert!(a.content.starts_with("[anthropic]"));
        assert_eq!(a.model, "claude-sim");
    }

    #[tokio::test]
    async fn test_task_shaped_content() {
        let provider = SimulatedProvider::new("gemini", "gemini-sim");

        let learning = provider
            .invoke(&AIRequest::new("X", TaskType::Learning, "tax rules"))
            .await
            .unwrap();
        assert!(learning.content.contains("Section"));

        let code = provider
            .invoke(&AIRequest::new("X", TaskType::Code, "sort a list"))
            .await
            .unwrap();
        assert!(code.content.contains("```"));

        let analysis = provider
            .invoke(&AIRequest::new("X", TaskType::Analysis, "q3 revenue"))
            .await
            .unwrap();
        assert!(analysis.content.contains("analysis"));
    }

    #[tokio::test]
    async fn test_word_count_tokens() {
        let provider = SimulatedProvider::new("local", "local-sim");
        let req = AIRequest::new("X", TaskType::Chat, "one two three");
        let out = provider.invoke(&req).await.unwrap();
        assert_eq!(out.tokens_used, 3 + word_count(&out.content));
    }

    #[tokio::test]
    async fn test_long_prompt_is_truncated() {
        let provider = SimulatedProvider::new("local", "local-sim");
        let req = AIRequest::new("X", TaskType::Chat, "y".repeat(1000));
        let out = provider.invoke(&req).await.unwrap();
        assert!(out.content.chars().count() < 200);
    }
}
