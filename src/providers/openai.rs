//! OpenAI chat-completions adapter.
//!
//! Maps an [`AIRequest`] onto `POST {base_url}/chat/completions`:
//!
//! | AIRequest | Chat request |
//! |-----------|--------------|
//! | `task_type` | system message from [`system_prompt`] |
//! | `context` | second system message carrying the JSON context |
//! | `prompt` | user message |
//! | `temperature`, `max_tokens` | passed through |
//! | `options.response_format` | `response_format.type` |
//!
//! HTTP 401/403 map to [`RouterError::AuthError`], 429 to
//! [`RouterError::RateLimited`], every other non-2xx status to
//! [`RouterError::ApiError`].

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, RouterError};
use crate::traits::{estimate_tokens, system_prompt, AIProvider, ProviderOutput};
use crate::types::AIRequest;

/// Public OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when none is configured.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Environment variable holding the API key by default.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, PartialEq)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

// ============================================================================
// Provider
// ============================================================================

/// OpenAI provider over HTTP.
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    id: String,
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a provider with an explicit key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            id: "openai".to_string(),
            client: Self::build_client(DEFAULT_HTTP_TIMEOUT)?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Create a provider whose key comes from `api_key_env`.
    ///
    /// Fails with [`RouterError::ConfigError`] when the variable is unset or
    /// empty.
    pub fn from_env(api_key_env: &str, model: impl Into<String>) -> Result<Self> {
        let api_key = resolve_api_key(api_key_env)?;
        Self::new(api_key, model)
    }

    /// Override the provider id reported to the router.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Point at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the HTTP client timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Self::build_client(timeout)?;
        Ok(self)
    }

    fn build_client(timeout: Duration) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RouterError::ConfigError(format!("Failed to build HTTP client: {}", e)))
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &AIRequest) -> ChatRequest {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: system_prompt(request.task_type).to_string(),
        }];

        if let Some(context) = request.context.as_ref().filter(|c| !c.is_null()) {
            messages.push(ChatMessage {
                role: "system",
                content: format!("Context: {}", context),
            });
        }

        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.response_format().map(|f| ResponseFormat {
                format_type: f.to_string(),
            }),
        }
    }

    fn parse_response(&self, request: &AIRequest, body: &str) -> Result<ProviderOutput> {
        let parsed: ChatResponse = serde_json::from_str(body)?;

        let content = parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.and_then(|m| m.content))
            .ok_or_else(|| RouterError::ApiError("OpenAI response contained no content".into()))?;

        let tokens = match parsed.usage {
            Some(u) => u
                .total_tokens
                .unwrap_or(u.prompt_tokens + u.completion_tokens),
            None => estimate_tokens(&request.prompt) + estimate_tokens(&content),
        };

        let model = parsed.model.unwrap_or_else(|| self.model.clone());
        Ok(ProviderOutput::new(content, model).with_tokens(tokens))
    }
}

fn resolve_api_key(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(RouterError::ConfigError(format!(
            "API key environment variable '{}' not set. \
             Please set it with: export {}=your-api-key",
            env_var, env_var
        ))),
    }
}

fn map_status(status: u16, body: &str) -> RouterError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        401 | 403 => RouterError::AuthError(message),
        429 => RouterError::RateLimited(message),
        _ => RouterError::ApiError(format!("OpenAI API {}: {}", status, message)),
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &AIRequest) -> Result<ProviderOutput> {
        let url = self.chat_completions_url();
        let body = self.build_request(request);

        debug!(url = %url, model = %self.model, task_type = %request.task_type, "OpenAI request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "OpenAI API error");
            return Err(map_status(status.as_u16(), &text));
        }

        self.parse_response(request, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RequestOptions, TaskType};
    use serde_json::json;
    use serial_test::serial;

    fn provider() -> OpenAIProvider {
        OpenAIProvider::new("sk-test", "gpt-4o-mini").unwrap()
    }

    #[test]
    fn test_chat_completions_url() {
        let p = provider().with_base_url("http://localhost:8080/v1/");
        assert_eq!(p.chat_completions_url(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(
            provider().chat_completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_build_request_minimal() {
        let req = AIRequest::new("X", TaskType::Code, "write a loop");
        let body = serde_json::to_value(provider().build_request(&req)).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], system_prompt(TaskType::Code));
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "write a loop");
        assert!(body.get("temperature").is_none());
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_build_request_passthrough() {
        let req = AIRequest::new("X", TaskType::Analysis, "numbers")
            .with_context(json!({"quarter": "Q3"}))
            .with_temperature(0.2)
            .with_max_tokens(500)
            .with_options(RequestOptions {
                response_format: Some("json_object".into()),
                ..Default::default()
            });
        let body = serde_json::to_value(provider().build_request(&req)).unwrap();

        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("Q3"));
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_parse_response_with_usage() {
        let req = AIRequest::new("X", TaskType::Chat, "hi");
        let body = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        }"#;

        let out = provider().parse_response(&req, body).unwrap();
        assert_eq!(out.content, "Hello!");
        assert_eq!(out.tokens_used, 12);
        assert_eq!(out.model, "gpt-4o-mini-2024-07-18");
    }

    #[test]
    fn test_parse_response_without_usage() {
        let req = AIRequest::new("X", TaskType::Chat, "abcd");
        let body = r#"{"choices": [{"message": {"content": "efgh"}}]}"#;

        let out = provider().parse_response(&req, body).unwrap();
        assert_eq!(out.tokens_used, 2);
        assert_eq!(out.model, "gpt-4o-mini");
    }

    #[test]
    fn test_parse_response_errors() {
        let req = AIRequest::new("X", TaskType::Chat, "hi");
        assert!(matches!(
            provider().parse_response(&req, "not json"),
            Err(RouterError::SerializationError(_))
        ));
        assert!(matches!(
            provider().parse_response(&req, r#"{"choices": []}"#),
            Err(RouterError::ApiError(_))
        ));
    }

    #[test]
    fn test_map_status() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "code": "invalid_api_key"}}"#;
        assert!(matches!(map_status(401, body), RouterError::AuthError(ref m) if m == "Incorrect API key provided"));
        assert!(matches!(map_status(429, "slow down"), RouterError::RateLimited(_)));
        match map_status(500, "oops") {
            RouterError::ApiError(m) => assert!(m.contains("500") && m.contains("oops")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_from_env_requires_key() {
        std::env::remove_var("HERA_TEST_OPENAI_KEY");
        let err = OpenAIProvider::from_env("HERA_TEST_OPENAI_KEY", "gpt-4o").unwrap_err();
        assert!(err.to_string().contains("HERA_TEST_OPENAI_KEY"));

        std::env::set_var("HERA_TEST_OPENAI_KEY", "  ");
        assert!(OpenAIProvider::from_env("HERA_TEST_OPENAI_KEY", "gpt-4o").is_err());
        std::env::remove_var("HERA_TEST_OPENAI_KEY");
    }

    #[test]
    #[serial]
    fn test_from_env_success() {
        std::env::set_var("HERA_TEST_OPENAI_KEY", "sk-abc");
        let p = OpenAIProvider::from_env("HERA_TEST_OPENAI_KEY", "gpt-4o")
            .unwrap()
            .with_id("openai-eu");
        assert_eq!(p.id(), "openai-eu");
        assert_eq!(p.model(), "gpt-4o");
        std::env::remove_var("HERA_TEST_OPENAI_KEY");
    }
}
