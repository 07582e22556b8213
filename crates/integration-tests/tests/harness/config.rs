//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use conduit_config::{
    Config, ConversationConfig, FallbackConfig, HealthConfig, LlmProviderConfig, LlmProviderType, ModelCatalogEntry,
    ModelConfig, ResponseCacheConfig, ServerConfig,
};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig {
                        enabled: true,
                        path: "/health".to_owned(),
                    },
                },
                llm: conduit_config::LlmConfig::default(),
                fallback: FallbackConfig::default(),
                cache: None,
                conversation: None,
                telemetry: None,
            },
        }
    }

    /// Add an OpenAI-compatible provider pointed at a mock backend
    pub fn with_openai_provider(mut self, name: &str, base_url: &str) -> Self {
        self.config.llm.providers.insert(
            name.to_owned(),
            LlmProviderConfig {
                provider_type: LlmProviderType::Openai,
                api_key: Some(SecretString::from("test-key")),
                base_url: Some(base_url.parse().expect("valid URL")),
                models: ModelConfig::default(),
                forward_authorization: false,
                timeout_seconds: 10,
            },
        );
        self
    }

    /// Set the fallback model catalog used by `auto` selection
    pub fn with_catalog(mut self, catalog: Vec<ModelCatalogEntry>) -> Self {
        self.config.fallback.catalog = catalog;
        self
    }

    /// Bound the number of fallback attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.fallback.max_attempts = max_attempts;
        self
    }

    /// Enable the in-process response cache
    pub fn with_cache(mut self) -> Self {
        self.config.cache = Some(ResponseCacheConfig {
            enabled: true,
            url: None,
            ttl_seconds: 0,
            key_prefix: "test:cache".to_owned(),
        });
        self
    }

    /// Enable in-process conversation correlation with the given TTL
    pub fn with_conversation(mut self, ttl_seconds: u64) -> Self {
        self.config.conversation = Some(ConversationConfig {
            enabled: true,
            url: None,
            ttl_seconds,
            key_prefix: "test:conv".to_owned(),
        });
        self
    }

    /// Disable the health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}

/// Catalog entry shorthand for fallback tests
pub fn catalog_entry(
    provider: &str,
    model: &str,
    price_tier: u8,
    speed_tier: u8,
    permissiveness: f64,
    structured_output: bool,
) -> ModelCatalogEntry {
    ModelCatalogEntry {
        provider: provider.to_owned(),
        model: model.to_owned(),
        price_tier,
        speed_tier,
        permissiveness,
        structured_output,
    }
}
