//! Model name resolution
//!
//! Maps a requested model to a (provider, model) pair using provider
//! configuration: explicit `provider/model` references, aliases, the
//! fallback catalog, and per-provider include/exclude patterns.

use std::collections::HashMap;

use conduit_config::{LlmConfig, ModelCatalogEntry};
use regex::Regex;

use crate::error::GatewayError;
use crate::types::ModelRef;

/// Resolved target for a model request
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    /// Provider name (key in config)
    pub provider: String,
    /// Actual model identifier to send to the provider
    pub model: String,
}

/// Routing-relevant model configuration extracted from a provider
#[derive(Debug, Clone, Default)]
struct ProviderModels {
    include: Vec<String>,
    exclude: Vec<String>,
    /// alias -> actual model name
    reverse_aliases: HashMap<String, String>,
    /// actual model name -> alias
    aliases: HashMap<String, String>,
}

/// Model resolution table
pub struct ModelResolver {
    providers: Vec<(String, ProviderModels)>,
    catalog: Vec<ModelCatalogEntry>,
}

impl ModelResolver {
    /// Build a resolver from configuration
    pub fn new(config: &LlmConfig, catalog: &[ModelCatalogEntry]) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|(name, provider_config)| {
                let mut aliases = HashMap::new();
                let mut reverse_aliases = HashMap::new();

                for (actual_model, model_override) in &provider_config.models.overrides {
                    if let Some(alias) = &model_override.alias {
                        aliases.insert(actual_model.clone(), alias.clone());
                        reverse_aliases.insert(alias.clone(), actual_model.clone());
                    }
                }

                let models = ProviderModels {
                    include: provider_config.models.include.clone(),
                    exclude: provider_config.models.exclude.clone(),
                    reverse_aliases,
                    aliases,
                };

                (name.clone(), models)
            })
            .collect();

        Self {
            providers,
            catalog: catalog.to_vec(),
        }
    }

    /// Resolve a model reference to a provider and model identifier
    pub fn resolve_ref(&self, reference: &ModelRef) -> Result<ResolvedModel, GatewayError> {
        reference.provider.as_ref().map_or_else(
            || self.resolve(&reference.model),
            |provider| self.resolve_explicit(provider, &reference.model),
        )
    }

    /// Resolve a model name to a provider and model identifier
    ///
    /// Supports `provider_name/model_name` for explicit provider selection
    /// and bare `model_name`, which searches aliases, then the catalog,
    /// then any provider whose filters admit the model.
    pub fn resolve(&self, model: &str) -> Result<ResolvedModel, GatewayError> {
        if let Some((provider, model_id)) = model.split_once('/') {
            return self.resolve_explicit(provider, model_id);
        }

        // Alias pass
        for (provider, models) in &self.providers {
            if let Some(actual) = models.reverse_aliases.get(model) {
                if is_model_allowed(models, actual) {
                    return Ok(ResolvedModel {
                        provider: provider.clone(),
                        model: actual.clone(),
                    });
                }
            }
        }

        // Catalog pass: first provider hosting the model, in catalog order
        for entry in &self.catalog {
            if entry.model == model
                && let Some(models) = self.provider_models(&entry.provider)
                && is_model_allowed(models, model)
            {
                return Ok(ResolvedModel {
                    provider: entry.provider.clone(),
                    model: model.to_owned(),
                });
            }
        }

        // Last pass: first provider whose filters admit the model
        for (provider, models) in &self.providers {
            if is_model_allowed(models, model) {
                return Ok(ResolvedModel {
                    provider: provider.clone(),
                    model: model.to_owned(),
                });
            }
        }

        Err(GatewayError::ModelNotFound {
            model: model.to_owned(),
        })
    }

    fn resolve_explicit(&self, provider: &str, model: &str) -> Result<ResolvedModel, GatewayError> {
        let Some(models) = self.provider_models(provider) else {
            return Err(GatewayError::ProviderNotFound {
                provider: provider.to_owned(),
            });
        };

        let actual = models
            .reverse_aliases
            .get(model)
            .cloned()
            .unwrap_or_else(|| model.to_owned());

        if !is_model_allowed(models, &actual) {
            return Err(GatewayError::ModelNotFound {
                model: format!("{provider}/{model}"),
            });
        }

        Ok(ResolvedModel {
            provider: provider.to_owned(),
            model: actual,
        })
    }

    fn provider_models(&self, provider: &str) -> Option<&ProviderModels> {
        self.providers
            .iter()
            .find(|(name, _)| name == provider)
            .map(|(_, models)| models)
    }

    /// All advertised models: catalog entries plus aliases
    pub fn list_models(&self) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();

        for entry in &self.catalog {
            let id = format!("{}/{}", entry.provider, entry.model);
            if !result.contains(&id) {
                result.push(id);
            }
        }

        for (_, models) in &self.providers {
            for alias in models.aliases.values() {
                if !result.contains(alias) {
                    result.push(alias.clone());
                }
            }
        }

        result
    }
}

/// Check if a model passes the include/exclude filters
fn is_model_allowed(config: &ProviderModels, model: &str) -> bool {
    if !config.include.is_empty() {
        let matches_include = config
            .include
            .iter()
            .any(|pattern| Regex::new(pattern).is_ok_and(|re| re.is_match(model)));
        if !matches_include {
            return false;
        }
    }

    let matches_exclude = config
        .exclude
        .iter()
        .any(|pattern| Regex::new(pattern).is_ok_and(|re| re.is_match(model)));

    !matches_exclude
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_config::{LlmProviderConfig, LlmProviderType, ModelConfig, ModelOverride};

    fn test_config() -> LlmConfig {
        let mut providers = indexmap::IndexMap::new();

        let mut overrides = HashMap::new();
        overrides.insert(
            "gpt-4o-2024-08-06".to_owned(),
            ModelOverride {
                alias: Some("gpt-4o".to_owned()),
            },
        );

        providers.insert(
            "openai".to_owned(),
            LlmProviderConfig {
                provider_type: LlmProviderType::Openai,
                api_key: None,
                base_url: None,
                models: ModelConfig {
                    include: Vec::new(),
                    exclude: vec!["^o1-preview".to_owned()],
                    overrides,
                },
                forward_authorization: false,
                timeout_seconds: 120,
            },
        );

        LlmConfig { providers }
    }

    #[test]
    fn explicit_provider_resolution() {
        let resolver = ModelResolver::new(&test_config(), &[]);
        let resolved = resolver.resolve("openai/gpt-4o-mini").unwrap();
        assert_eq!(resolved.provider, "openai");
        assert_eq!(resolved.model, "gpt-4o-mini");
    }

    #[test]
    fn unknown_provider_rejected() {
        let resolver = ModelResolver::new(&test_config(), &[]);
        let err = resolver.resolve("nonexistent/some-model").unwrap_err();
        assert!(matches!(err, GatewayError::ProviderNotFound { .. }));
    }

    #[test]
    fn alias_resolves_to_actual_model() {
        let resolver = ModelResolver::new(&test_config(), &[]);
        let resolved = resolver.resolve("gpt-4o").unwrap();
        assert_eq!(resolved.provider, "openai");
        assert_eq!(resolved.model, "gpt-4o-2024-08-06");
    }

    #[test]
    fn excluded_model_not_served() {
        let resolver = ModelResolver::new(&test_config(), &[]);
        let err = resolver.resolve("openai/o1-preview").unwrap_err();
        assert!(matches!(err, GatewayError::ModelNotFound { .. }));
    }
}
