use std::path::Path;

use crate::Config;

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

        let expanded =
            crate::env::expand_env(&raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no providers are configured, model patterns are
    /// invalid, or the fallback catalog references unknown providers
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.providers.is_empty() {
            anyhow::bail!("at least one LLM provider must be configured");
        }

        for (name, provider) in &self.llm.providers {
            for pattern in provider.models.include.iter().chain(&provider.models.exclude) {
                regex::Regex::new(pattern)
                    .map_err(|e| anyhow::anyhow!("invalid model pattern for provider '{name}': {e}"))?;
            }
        }

        for entry in &self.fallback.catalog {
            if !self.llm.providers.contains_key(&entry.provider) {
                anyhow::bail!(
                    "fallback catalog entry '{}/{}' references unknown provider",
                    entry.provider,
                    entry.model
                );
            }
            if !(0.0..=1.0).contains(&entry.permissiveness) {
                anyhow::bail!(
                    "fallback catalog entry '{}/{}' has permissiveness outside 0.0-1.0",
                    entry.provider,
                    entry.model
                );
            }
        }

        if self.fallback.max_attempts == 0 {
            anyhow::bail!("fallback.max_attempts must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Config;

    #[test]
    fn minimal_config_parses() {
        let toml = r#"
            [llm.providers.openai]
            type = "openai"
            api_key = "sk-test"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.llm.providers.len(), 1);
        assert_eq!(config.fallback.max_attempts, 3);
    }

    #[test]
    fn empty_config_fails_validation() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn catalog_with_unknown_provider_rejected() {
        let toml = r#"
            [llm.providers.openai]
            type = "openai"

            [[fallback.catalog]]
            provider = "missing"
            model = "some-model"
            price_tier = 2
            speed_tier = 2
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn invalid_model_pattern_rejected() {
        let toml = r#"
            [llm.providers.openai]
            type = "openai"
            models = { include = ["gpt-[" ] }
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }
}
