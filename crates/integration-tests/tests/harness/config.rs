//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use secrecy::SecretString;
use switchboard_config::{Config, CorsConfig, ServerConfig};

use super::mock_vendor::MockVendor;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with the shared test secret and no vendors
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    api_key: Some(SecretString::from(super::API_KEY)),
                    ..ServerConfig::default()
                },
                ..Config::default()
            },
        }
    }

    /// Add a raw credential entry
    pub fn with_credential(mut self, key: &str, value: &str) -> Self {
        self.config
            .credentials
            .insert(key.to_owned(), SecretString::from(value.to_owned()));
        self
    }

    /// Configure the `OpenAI` adapter against a mock vendor
    pub fn with_openai(self, mock: &MockVendor) -> Self {
        self.with_credential("OPENAI_API_KEY", "sk-test")
            .with_credential("OPENAI_BASE_URL", &mock.openai_base_url())
    }

    /// Configure the Anthropic adapter against a mock vendor
    pub fn with_anthropic(self, mock: &MockVendor) -> Self {
        self.with_credential("ANTROPIC_API_KEY", "sk-ant-test")
            .with_credential("ANTROPIC_BASE_URL", &mock.anthropic_base_url())
    }

    /// Configure the Gemini adapter against a mock vendor
    pub fn with_google(self, mock: &MockVendor) -> Self {
        self.with_credential("GOOGLE_GEN_AI_API_KEY", "goog-test")
            .with_credential("GOOGLE_GEN_AI_BASE_URL", &mock.google_base_url())
    }

    /// Configure the Cohere adapter against a mock vendor
    pub fn with_cohere(self, mock: &MockVendor) -> Self {
        self.with_credential("COHERE_API_KEY", "co-test")
            .with_credential("COHERE_BASE_URL", &mock.cohere_base_url())
    }

    /// Configure `OpenRouter` against a mock vendor serving `models`
    pub fn with_openrouter(self, mock: &MockVendor, models: &str) -> Self {
        self.with_credential("OPENROUTER_API_KEY", "or-test")
            .with_credential("OPENROUTER_BASE_URL", &mock.openai_base_url())
            .with_credential("OPENROUTER_MODELS", models)
    }

    /// Replace the shared bearer secret
    pub fn with_api_key(mut self, api_key: Option<&str>) -> Self {
        self.config.server.api_key = api_key.map(SecretString::from);
        self
    }

    /// Set CORS configuration
    pub fn with_cors(mut self, config: CorsConfig) -> Self {
        self.config.server.cors = Some(config);
        self
    }

    /// Set the chunk buffer between vendor streams and clients
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.config.server.stream_buffer = capacity;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
