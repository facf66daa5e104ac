//! Router error types.
//!
//! # Error Taxonomy
//!
//! | Error | Raised when | Router reaction |
//! |-------|-------------|-----------------|
//! | `ProviderUnavailable` | A candidate's availability flag is down | Skipped during routing |
//! | `ApiError` / `NetworkError` / `RateLimited` / `AuthError` / `Timeout` | The adapter call failed | Next candidate if fallback is enabled |
//! | `NoProviderAvailable` | Every provider is down or exhausted | Failure response |
//! | `Cancelled` | The caller's cancellation token fired | Failure response, loop stops |
//! | `SerializationError` / `Internal` | Anything else during orchestration | Failure response |
//!
//! None of these escape [`AIRequestRouter::process_request`](crate::AIRequestRouter::process_request):
//! the router folds them into a failure-shaped [`AIResponse`](crate::AIResponse).

use thiserror::Error;

/// Result type for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

/// Errors that can occur while routing or serving an AI request.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The provider exists but is marked down.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No provider is registered or available.
    #[error("No AI provider available")]
    NoProviderAvailable,

    /// Unknown provider id.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// API error returned by a backend.
    #[error("API error: {0}")]
    ApiError(String),

    /// Network error talking to a backend.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Backend rate limit hit.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Backend rejected the credentials.
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// A provider call exceeded its deadline.
    #[error("Provider call timed out after {0} ms")]
    Timeout(u64),

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Unexpected failure inside the router itself.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for RouterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RouterError::NetworkError(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            RouterError::NetworkError(format!("Connection failed: {}", err))
        } else {
            RouterError::NetworkError(err.to_string())
        }
    }
}

impl RouterError {
    /// Get a user-friendly description of the error.
    ///
    /// # Example
    ///
    /// ```
    /// use hera_ai_router::RouterError;
    ///
    /// let error = RouterError::AuthError("invalid key".to_string());
    /// assert!(error.user_description().contains("API key"));
    /// ```
    pub fn user_description(&self) -> String {
        match self {
            Self::ProviderUnavailable(id) => {
                format!("The AI provider '{}' is currently unavailable.", id)
            }
            Self::NoProviderAvailable => {
                "No AI provider is available right now. Please try again later.".to_string()
            }
            Self::ProviderNotFound(id) => format!("Unknown AI provider '{}'.", id),
            Self::NetworkError(_) => {
                "Unable to reach the AI service. Check your network connection.".to_string()
            }
            Self::Timeout(ms) => format!("The AI service did not answer within {} ms.", ms),
            Self::RateLimited(_) => "The AI service is rate limiting requests.".to_string(),
            Self::AuthError(_) => {
                "Authentication failed. Please check your API key is valid and not expired."
                    .to_string()
            }
            Self::Cancelled => "The request was cancelled.".to_string(),
            Self::InvalidRequest(msg) => format!("Invalid request: {}.", msg),
            Self::ConfigError(msg) => format!("Configuration error: {}.", msg),
            Self::ApiError(_) => "The AI service returned an error.".to_string(),
            Self::SerializationError(_) => {
                "Failed to parse the AI service response.".to_string()
            }
            Self::Internal(msg) => format!("An unexpected error occurred: {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_error_display() {
        let error = RouterError::ApiError("something went wrong".to_string());
        assert_eq!(error.to_string(), "API error: something went wrong");

        let error = RouterError::RateLimited("too many requests".to_string());
        assert_eq!(error.to_string(), "Rate limit exceeded: too many requests");

        let error = RouterError::Timeout(1500);
        assert_eq!(error.to_string(), "Provider call timed out after 1500 ms");

        assert_eq!(
            RouterError::NoProviderAvailable.to_string(),
            "No AI provider available"
        );
    }

    #[test]
    fn test_router_error_from_serde_json() {
        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("not json at all").unwrap_err();
        let err: RouterError = json_err.into();
        assert!(matches!(err, RouterError::SerializationError(_)));
    }

    #[test]
    fn test_user_description_outage() {
        let desc = RouterError::NoProviderAvailable.user_description();
        assert!(desc.contains("No AI provider"));
    }

    #[test]
    fn test_user_description_timeout() {
        let desc = RouterError::Timeout(250).user_description();
        assert!(desc.contains("250 ms"));
    }
}
