//! Router configuration.
//!
//! # Configuration File Location
//!
//! The config file is loaded from (in order of priority):
//! 1. `HERA_AI_CONFIG` environment variable
//! 2. `./hera-ai.toml` (current working directory)
//! 3. `~/.hera/hera-ai.toml` (user config)
//! 4. Built-in default configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [router]
//! default_timeout_ms = 30000
//! stream_word_delay_ms = 0
//! degraded_threshold = 0.8
//!
//! [cache]
//! enabled = true
//! max_entries = 1000
//! ttl_seconds = 3600
//!
//! [[providers]]
//! id = "openai"
//! kind = "openai"
//! api_key_env = "OPENAI_API_KEY"
//! model = "gpt-4o-mini"
//! cost_per_token = 0.00002
//! confidence_bonus = 0.15
//!
//! [[providers]]
//! id = "anthropic"
//! kind = "simulated"
//! model = "claude-3-5-sonnet"
//! confidence_bonus = 0.2
//!
//! [routing]
//! analysis = ["anthropic", "openai"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::error::RouterError;
use crate::metrics::DEFAULT_DEGRADED_THRESHOLD;
use crate::providers::openai::{DEFAULT_OPENAI_MODEL, OPENAI_API_KEY_ENV, OPENAI_BASE_URL};
use crate::routing::RoutingTable;
use crate::types::{Capability, ProviderDescriptor};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "HERA_AI_CONFIG";

/// File name searched in the working directory and `~/.hera/`.
pub const CONFIG_FILE_NAME: &str = "hera-ai.toml";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse or serialize TOML.
    #[error("Failed to parse TOML config: {0}")]
    ParseError(String),

    /// Invalid configuration values.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for RouterError {
    fn from(err: ConfigError) -> Self {
        RouterError::ConfigError(err.to_string())
    }
}

// ============================================================================
// Sections
// ============================================================================

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_degraded_threshold() -> f64 {
    DEFAULT_DEGRADED_THRESHOLD
}

/// `[router]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Per-call deadline when neither the request nor the provider sets one.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Delay between words in `process_stream`.
    #[serde(default)]
    pub stream_word_delay_ms: u64,

    /// Success rate below which a provider is reported as degraded.
    #[serde(default = "default_degraded_threshold")]
    pub degraded_threshold: f64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            stream_word_delay_ms: 0,
            degraded_threshold: default_degraded_threshold(),
        }
    }
}

/// How a configured provider is backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Real OpenAI chat-completions API.
    OpenAI,
    /// Local deterministic stand-in.
    #[default]
    Simulated,
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(flatten)]
    pub descriptor: ProviderDescriptor,

    #[serde(default)]
    pub kind: ProviderKind,

    /// Environment variable holding the API key (`openai` kind).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Endpoint override (`openai` kind).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn simulated(descriptor: ProviderDescriptor) -> Self {
        Self {
            descriptor,
            kind: ProviderKind::Simulated,
            api_key_env: None,
            base_url: None,
        }
    }

    pub fn openai(descriptor: ProviderDescriptor) -> Self {
        Self {
            descriptor,
            kind: ProviderKind::OpenAI,
            api_key_env: Some(OPENAI_API_KEY_ENV.to_string()),
            base_url: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// API key variable, defaulting to `OPENAI_API_KEY`.
    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(OPENAI_API_KEY_ENV)
    }

    /// Endpoint, defaulting to the public OpenAI API.
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(OPENAI_BASE_URL)
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root of `hera-ai.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub router: RouterSettings,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Providers in registration order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub routing: RoutingTable,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::builtin_defaults()
    }
}

impl RouterConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if Path::new(&path).exists() {
                return Self::from_file(&path);
            }
        }

        let local_path = Path::new(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Self::from_file(local_path);
        }

        if let Some(home) = dirs::home_dir() {
            let user_path = home.join(".hera").join(CONFIG_FILE_NAME);
            if user_path.exists() {
                return Self::from_file(&user_path);
            }
        }

        Ok(Self::builtin_defaults())
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let toml_str = self.to_toml()?;
        std::fs::write(path.as_ref(), toml_str)?;
        Ok(())
    }

    /// OpenAI plus simulated `anthropic`, `gemini` and `local` backends.
    pub fn builtin_defaults() -> Self {
        use Capability::*;

        Self {
            router: RouterSettings::default(),
            cache: CacheConfig::default(),
            providers: vec![
                ProviderConfig::openai(
                    ProviderDescriptor::new("openai")
                        .with_display_name("OpenAI")
                        .with_priority(1)
                        .with_capabilities(vec![Chat, Code, Analysis, Creative, Reasoning, Multimodal])
                        .with_cost_per_token(0.000_002)
                        .with_max_tokens(128_000)
                        .with_model(DEFAULT_OPENAI_MODEL)
                        .with_confidence_bonus(0.15),
                ),
                ProviderConfig::simulated(
                    ProviderDescriptor::new("anthropic")
                        .with_display_name("Anthropic Claude")
                        .with_priority(2)
                        .with_capabilities(vec![Chat, Code, Analysis, Creative, Reasoning])
                        .with_cost_per_token(0.000_003)
                        .with_max_tokens(200_000)
                        .with_model("claude-3-5-sonnet")
                        .with_confidence_bonus(0.2),
                ),
                ProviderConfig::simulated(
                    ProviderDescriptor::new("gemini")
                        .with_display_name("Google Gemini")
                        .with_priority(3)
                        .with_capabilities(vec![Chat, Code, Analysis, Creative, Multimodal])
                        .with_cost_per_token(0.000_001)
                        .with_max_tokens(1_000_000)
                        .with_model("gemini-1.5-pro")
                        .with_confidence_bonus(0.1),
                ),
                ProviderConfig::simulated(
                    ProviderDescriptor::new("local")
                        .with_display_name("Local model")
                        .with_priority(4)
                        .with_capabilities(vec![Chat, Code])
                        .with_cost_per_token(0.0)
                        .with_max_tokens(8_192)
                        .with_model("local-llm")
                        .with_confidence_bonus(-0.1),
                ),
            ],
            routing: RoutingTable::builtin(),
        }
    }

    /// Look up a provider entry by id.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id() == id)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router.default_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "router.default_timeout_ms must be greater than zero".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.router.degraded_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "router.degraded_threshold must be within [0, 1], got {}",
                self.router.degraded_threshold
            )));
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_entries must be greater than zero when the cache is enabled".into(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            let id = provider.id();
            if id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "Provider id must not be empty".into(),
                ));
            }
            if !seen.insert(id) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate provider id: '{}'",
                    id
                )));
            }
            if provider.descriptor.cost_per_token < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "Provider '{}' has a negative cost_per_token",
                    id
                )));
            }
        }

        if let Some(task) = self.routing.unknown_tasks().first() {
            return Err(ConfigError::ValidationError(format!(
                "Routing entry for unknown task type '{}'",
                task
            )));
        }

        for (task, id) in self.routing.referenced_providers() {
            if !seen.contains(id) {
                return Err(ConfigError::ValidationError(format!(
                    "Routing for '{}' references unknown provider '{}'",
                    task, id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskType;
    use serial_test::serial;
    use std::time::Duration;

    #[test]
    fn test_builtin_defaults() {
        let config = RouterConfig::builtin_defaults();
        assert!(config.validate().is_ok());
        assert_eq!(config.providers.len(), 4);
        assert_eq!(config.provider("openai").unwrap().kind, ProviderKind::OpenAI);
        assert_eq!(config.provider("local").unwrap().descriptor.confidence_bonus, -0.1);
        assert_eq!(config.router.stream_word_delay_ms, 0);
    }

    #[test]
    fn test_parse_minimal() {
        let config = RouterConfig::from_toml(
            r#"
            [[providers]]
            id = "alpha"
            "#,
        )
        .unwrap();

        assert_eq!(config.providers.len(), 1);
        let alpha = &config.providers[0];
        assert_eq!(alpha.kind, ProviderKind::Simulated);
        assert!(alpha.descriptor.available);
        assert_eq!(alpha.descriptor.priority, 100);
        assert_eq!(config.router, RouterSettings::default());
        assert_eq!(config.cache, CacheConfig::default());
        assert!(config.routing.preferred_order(TaskType::Chat).is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full() {
        let config = RouterConfig::from_toml(
            r#"
            [router]
            default_timeout_ms = 5000
            stream_word_delay_ms = 20
            degraded_threshold = 0.5

            [cache]
            max_entries = 10
            ttl_seconds = 60

            [[providers]]
            id = "openai"
            kind = "openai"
            api_key_env = "MY_OPENAI_KEY"
            base_url = "http://localhost:8080/v1"
            model = "gpt-4o"
            cost_per_token = 0.00001
            confidence_bonus = 0.15
            capabilities = ["chat", "code"]
            timeout_ms = 1500

            [[providers]]
            id = "local"
            confidence_bonus = -0.1
            available = false

            [routing]
            code = ["local", "openai"]
            "#,
        )
        .unwrap();

        assert_eq!(config.router.default_timeout_ms, 5000);
        assert_eq!(config.router.stream_word_delay_ms, 20);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));

        let openai = config.provider("openai").unwrap();
        assert_eq!(openai.api_key_env(), "MY_OPENAI_KEY");
        assert_eq!(openai.base_url(), "http://localhost:8080/v1");
        assert_eq!(openai.descriptor.timeout_ms, Some(1500));
        assert!(openai.descriptor.supports(Capability::Code));

        assert!(!config.provider("local").unwrap().descriptor.available);
        assert_eq!(config.routing.preferred_order(TaskType::Code), ["local", "openai"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        let err = RouterConfig::from_toml("[[providers]\nid = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));

        let router_err: RouterError = err.into();
        assert!(matches!(router_err, RouterError::ConfigError(_)));
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let mut config = RouterConfig::builtin_defaults();
        config
            .providers
            .push(ProviderConfig::simulated(ProviderDescriptor::new("gemini")));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate provider id"));
    }

    #[test]
    fn test_validate_unknown_routing_provider() {
        let mut config = RouterConfig::builtin_defaults();
        config.routing.set(TaskType::Chat, ["openai", "mistral"]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mistral"));
    }

    #[test]
    fn test_validate_unknown_routing_task() {
        let config = RouterConfig::from_toml(
            r#"
            [[providers]]
            id = "a"

            [routing]
            translation = ["a"]
            "#,
        )
        .unwrap();
        assert!(config.validate().unwrap_err().to_string().contains("translation"));
    }

    #[test]
    fn test_validate_negative_cost() {
        let mut config = RouterConfig::builtin_defaults();
        config.providers[1].descriptor.cost_per_token = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_cache_and_router_settings() {
        let mut config = RouterConfig::builtin_defaults();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());

        config.cache.enabled = false;
        assert!(config.validate().is_ok());

        config.router.degraded_threshold = 1.5;
        assert!(config.validate().is_err());

        config.router.degraded_threshold = 0.8;
        config.router.default_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let config = RouterConfig::builtin_defaults();
        config.save(&path).unwrap();

        let loaded = RouterConfig::from_file(&path).unwrap();
        assert_eq!(loaded.providers.len(), 4);
        assert_eq!(loaded.provider("anthropic").unwrap().descriptor.model, "claude-3-5-sonnet");
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = RouterConfig::from_file("/nonexistent/hera-ai.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    #[serial]
    fn test_load_from_env_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
            [router]
            default_timeout_ms = 1234

            [[providers]]
            id = "only"
            "#,
        )
        .unwrap();

        std::env::set_var(CONFIG_ENV_VAR, &path);
        let config = RouterConfig::load().unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(config.router.default_timeout_ms, 1234);
        assert_eq!(config.providers.len(), 1);
    }
}
