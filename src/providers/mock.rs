//! Scriptable provider for tests.
//!
//! ```text
//! MockProvider
//!   ├── add_response() / add_failure() / add_panic()   queue scripted replies
//!   ├── with_delay()                                   simulate latency
//!   ├── call_count() / prompts()                       inspect what was invoked
//!   └── invoke()                                       pop the next reply
//! ```
//!
//! When the queue is empty, every call answers `"Mock response from {id}"`,
//! or fails if the provider was built with [`MockProvider::failing`].

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{Result, RouterError};
use crate::traits::{estimate_tokens, AIProvider, ProviderOutput};
use crate::types::AIRequest;

/// One scripted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Answer with this text.
    Text(String),
    /// Fail with an API error carrying this message.
    Failure(String),
    /// Panic inside the adapter.
    Panic(String),
}

/// Mock AI provider for testing.
#[derive(Debug, Clone)]
pub struct MockProvider {
    id: String,
    model: String,
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    fallback_reply: Option<MockReply>,
    delay: Option<Duration>,
    call_count: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a provider that answers every call.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            model: format!("{}-mock", id),
            id,
            replies: Arc::new(Mutex::new(VecDeque::new())),
            fallback_reply: None,
            delay: None,
            call_count: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a provider whose every unscripted call fails.
    pub fn failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        let mut provider = Self::new(id);
        provider.fallback_reply = Some(MockReply::Failure(message.into()));
        provider
    }

    /// Override the reported model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a text reply.
    pub async fn add_response(&self, response: impl Into<String>) {
        self.replies
            .lock()
            .await
            .push_back(MockReply::Text(response.into()));
    }

    /// Synchronous version of [`add_response`](Self::add_response) for test
    /// setup.
    ///
    /// Returns `false` without queueing anything when the reply queue is
    /// locked by an in-flight call.
    #[must_use]
    pub fn add_response_sync(&self, response: impl Into<String>) -> bool {
        match self.replies.try_lock() {
            Ok(mut replies) => {
                replies.push_back(MockReply::Text(response.into()));
                true
            }
            Err(_) => false,
        }
    }

    /// Queue a failing reply.
    pub async fn add_failure(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .await
            .push_back(MockReply::Failure(message.into()));
    }

    /// Queue a panicking reply.
    pub async fn add_panic(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .await
            .push_back(MockReply::Panic(message.into()));
    }

    /// Number of `invoke` calls so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    /// Whether every queued reply has been consumed.
    pub async fn is_exhausted(&self) -> bool {
        self.replies.lock().await.is_empty()
    }
}

#[async_trait]
impl AIProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &AIRequest) -> Result<ProviderOutput> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(request.prompt.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().await.pop_front();
        let reply = reply
            .or_else(|| self.fallback_reply.clone())
            .unwrap_or_else(|| MockReply::Text(format!("Mock response from {}", self.id)));

        match reply {
            MockReply::Text(content) => {
                let tokens = estimate_tokens(&request.prompt) + estimate_tokens(&content);
                Ok(ProviderOutput::new(content, self.model.clone()).with_tokens(tokens))
            }
            MockReply::Failure(message) => Err(RouterError::ApiError(message)),
            MockReply::Panic(message) => panic!("{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskType;

    fn request(prompt: &str) -> AIRequest {
        AIRequest::new("HERA.AI.TEST.v1", TaskType::Chat, prompt)
    }

    #[tokio::test]
    async fn test_default_reply() {
        let provider = MockProvider::new("openai");
        let out = provider.invoke(&request("hi")).await.unwrap();
        assert_eq!(out.content, "Mock response from openai");
        assert_eq!(out.model, "openai-mock");
        assert!(out.tokens_used > 0);
    }

    #[tokio::test]
    async fn test_queued_replies_in_order() {
        let provider = MockProvider::new("a").with_model("m");
        provider.add_response("first").await;
        provider.add_failure("boom").await;
        assert!(provider.add_response_sync("third"));

        assert_eq!(provider.invoke(&request("1")).await.unwrap().content, "first");
        let err = provider.invoke(&request("2")).await.unwrap_err();
        assert!(matches!(err, RouterError::ApiError(ref m) if m == "boom"));
        assert_eq!(provider.invoke(&request("3")).await.unwrap().content, "third");

        assert!(provider.is_exhausted().await);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.prompts().await, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_add_response_sync_reports_locked_queue() {
        let provider = MockProvider::new("a");
        let guard = provider.replies.lock().await;
        assert!(!provider.add_response_sync("dropped"));
        drop(guard);

        assert!(provider.add_response_sync("kept"));
        assert_eq!(provider.invoke(&request("x")).await.unwrap().content, "kept");
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let provider = MockProvider::failing("a", "down");
        assert!(provider.invoke(&request("x")).await.is_err());
        assert!(provider.invoke(&request("x")).await.is_err());

        provider.add_response("recovered").await;
        assert_eq!(provider.invoke(&request("x")).await.unwrap().content, "recovered");
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let provider = MockProvider::new("a");
        let clone = provider.clone();
        clone.add_response("shared").await;

        assert_eq!(provider.invoke(&request("x")).await.unwrap().content, "shared");
        assert_eq!(clone.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay() {
        let provider = MockProvider::new("slow").with_delay(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        provider.invoke(&request("x")).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
