//! Builds providers, registries and routers from configuration.
//!
//! # Environment Variables
//!
//! - `HERA_AI_CONFIG`: path to a `hera-ai.toml` file
//! - `OPENAI_API_KEY` (or the provider's `api_key_env`): OpenAI credentials
//!
//! An `openai` provider whose key variable is missing is still registered,
//! but marked unavailable, so routing skips it until someone calls
//! [`ProviderRegistry::mark_up`].
//!
//! # Example
//!
//! ```rust,no_run
//! use hera_ai_router::{AIRequest, ProviderFactory, TaskType};
//!
//! # async fn run() -> hera_ai_router::Result<()> {
//! let router = ProviderFactory::from_env()?;
//! let response = router
//!     .process_request(&AIRequest::new("HERA.AI.CHAT.COMPLETION.v1", TaskType::Chat, "Hello"))
//!     .await;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{ProviderConfig, ProviderKind, RouterConfig};
use crate::error::Result;
use crate::providers::{OpenAIProvider, SimulatedProvider};
use crate::registry::ProviderRegistry;
use crate::router::AIRequestRouter;
use crate::traits::AIProvider;
use crate::types::ProviderDescriptor;

/// Factory for adapters and routers.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Load configuration, validate it and build a router.
    pub fn from_env() -> Result<AIRequestRouter> {
        let config = RouterConfig::load()?;
        Self::build_router(&config)
    }

    /// Validate `config` and build a router from it.
    pub fn build_router(config: &RouterConfig) -> Result<AIRequestRouter> {
        config.validate()?;
        let registry = Self::build_registry(config)?;

        for descriptor in registry.descriptors() {
            debug!(
                provider = %descriptor.id,
                priority = descriptor.priority,
                model = %descriptor.model,
                available = descriptor.available,
                "Registered provider"
            );
        }

        Ok(AIRequestRouter::builder(Arc::new(registry))
            .routing(config.routing.clone())
            .cache(config.cache.clone())
            .default_timeout(Duration::from_millis(config.router.default_timeout_ms))
            .stream_word_delay(Duration::from_millis(config.router.stream_word_delay_ms))
            .degraded_threshold(config.router.degraded_threshold)
            .build())
    }

    /// Register every configured provider, in configuration order.
    pub fn build_registry(config: &RouterConfig) -> Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();
        for provider in &config.providers {
            let (descriptor, adapter) = Self::create(provider)?;
            registry.register(descriptor, adapter);
        }
        Ok(registry)
    }

    /// Create the adapter for one provider entry.
    ///
    /// The returned descriptor has `available = false` when the adapter
    /// cannot work yet (missing API key).
    pub fn create(config: &ProviderConfig) -> Result<(ProviderDescriptor, Arc<dyn AIProvider>)> {
        let mut descriptor = config.descriptor.clone();
        let id = descriptor.id.clone();

        let adapter: Arc<dyn AIProvider> = match config.kind {
            ProviderKind::Simulated => Arc::new(SimulatedProvider::new(&id, &descriptor.model)),
            ProviderKind::OpenAI => {
                let model = if descriptor.model.is_empty() {
                    crate::providers::openai::DEFAULT_OPENAI_MODEL.to_string()
                } else {
                    descriptor.model.clone()
                };
                descriptor.model = model.clone();

                let provider = match OpenAIProvider::from_env(config.api_key_env(), &model) {
                    Ok(provider) => provider,
                    Err(e) => {
                        warn!(provider = %id, error = %e, "OpenAI key missing, provider marked unavailable");
                        descriptor.available = false;
                        OpenAIProvider::new(String::new(), &model)?
                    }
                };
                Arc::new(provider.with_id(&id).with_base_url(config.base_url()))
            }
        };

        debug!(
            provider = %id,
            kind = ?config.kind,
            model = %descriptor.model,
            available = descriptor.available,
            "Created provider"
        );
        Ok((descriptor, adapter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AIRequest, TaskType};
    use serial_test::serial;

    const TEST_KEY_ENV: &str = "HERA_FACTORY_TEST_OPENAI_KEY";

    fn openai_entry() -> ProviderConfig {
        let mut entry = ProviderConfig::openai(ProviderDescriptor::new("openai"));
        entry.api_key_env = Some(TEST_KEY_ENV.to_string());
        entry
    }

    #[test]
    fn test_create_simulated() {
        let entry = ProviderConfig::simulated(ProviderDescriptor::new("gemini").with_model("g-1"));
        let (descriptor, adapter) = ProviderFactory::create(&entry).unwrap();
        assert!(descriptor.available);
        assert_eq!(adapter.id(), "gemini");
        assert_eq!(adapter.model(), "g-1");
    }

    #[test]
    #[serial]
    fn test_openai_without_key_is_unavailable() {
        std::env::remove_var(TEST_KEY_ENV);
        let (descriptor, adapter) = ProviderFactory::create(&openai_entry()).unwrap();
        assert!(!descriptor.available);
        assert_eq!(descriptor.model, "gpt-4o-mini");
        assert_eq!(adapter.id(), "openai");
    }

    #[test]
    #[serial]
    fn test_openai_with_key_is_available() {
        std::env::set_var(TEST_KEY_ENV, "sk-test");
        let (descriptor, adapter) = ProviderFactory::create(&openai_entry()).unwrap();
        std::env::remove_var(TEST_KEY_ENV);

        assert!(descriptor.available);
        assert_eq!(adapter.model(), "gpt-4o-mini");
    }

    #[test]
    #[serial]
    fn test_build_registry_keeps_order() {
        std::env::remove_var("OPENAI_API_KEY");
        let registry = ProviderFactory::build_registry(&RouterConfig::builtin_defaults()).unwrap();
        assert_eq!(registry.ids(), vec!["openai", "anthropic", "gemini", "local"]);
        assert!(!registry.is_available("openai"));
        assert_eq!(registry.available_ids(), vec!["anthropic", "gemini", "local"]);
    }

    #[test]
    fn test_build_router_rejects_invalid_config() {
        let mut config = RouterConfig::builtin_defaults();
        config.providers.clear();
        let err = ProviderFactory::build_router(&config).unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
    }

    #[tokio::test]
    #[serial]
    async fn test_builtin_router_serves_without_openai_key() {
        std::env::remove_var("OPENAI_API_KEY");
        let router = ProviderFactory::build_router(&RouterConfig::builtin_defaults()).unwrap();

        let req = AIRequest::new("HERA.AI.CODE.GENERATE.v1", TaskType::Code, "Sort a list");
        let resp = router.process_request(&req).await;

        assert!(resp.success);
        // openai leads the code order but has no key
        assert_eq!(resp.provider_used, "anthropic");
        assert_eq!(resp.fallback_used, Some(false));
    }
}
