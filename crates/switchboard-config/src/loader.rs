use std::path::Path;

use secrecy::ExposeSecret;

use crate::{AnyOrList, Config};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Load the file at `path` if it exists, otherwise fall back to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file fails to load
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_server()?;
        self.validate_credentials()?;
        Ok(())
    }

    fn validate_server(&self) -> anyhow::Result<()> {
        if self.server.stream_buffer == 0 {
            anyhow::bail!("server.stream_buffer must be greater than 0");
        }

        if self
            .server
            .api_key
            .as_ref()
            .is_some_and(|key| key.expose_secret().is_empty())
        {
            anyhow::bail!("server.api_key must not be empty when set");
        }

        if let Some(ref cors) = self.server.cors
            && let AnyOrList::List(ref methods) = cors.methods
        {
            for method in methods {
                method
                    .parse::<http::Method>()
                    .map_err(|e| anyhow::anyhow!("invalid CORS method '{method}': {e}"))?;
            }
        }

        Ok(())
    }

    fn validate_credentials(&self) -> anyhow::Result<()> {
        if let Some(key) = self.credentials.keys().find(|key| key.trim().is_empty()) {
            anyhow::bail!("credential names must not be empty (found {key:?})");
        }

        Ok(())
    }
}
