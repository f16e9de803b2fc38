//! Provider Registry for routing models to LLM providers
//!
//! Each configured provider declares the model-id prefixes it serves. A model
//! is routed to the provider with the longest matching prefix, or to the
//! provider marked `default` when nothing matches.

use crate::llm::client::{LLMClient, Provider};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{ConfigError, MiooConfig};
use std::collections::HashMap;
use std::sync::Arc;

/// Pick the value whose key is the longest prefix of `model`.
pub fn longest_prefix_match<'a, I>(model: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    candidates
        .into_iter()
        .filter(|(prefix, _)| !prefix.is_empty() && model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, value)| value)
}

struct RegisteredProvider {
    client: Arc<dyn LLMClient>,
    model_prefixes: Vec<String>,
}

/// Registry of live provider clients
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, RegisteredProvider>,
    default_provider: Option<String>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for every provider in the configuration
    pub fn from_config(config: &MiooConfig) -> std::result::Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (name, provider_config) in &config.providers {
            let api_key = config
                .resolve_env(&provider_config.api_key_env)
                .ok_or_else(|| ConfigError::MissingEnvVar(provider_config.api_key_env.clone()))?;

            let provider = Provider::new(
                provider_config.kind,
                name.clone(),
                api_key,
                provider_config.base_url.clone(),
                config.call_timeout(),
            );
            let client = provider.create_client().map_err(|e| {
                ConfigError::ValidationError(format!("provider '{}': {}", name, e))
            })?;

            registry.register(
                name,
                Arc::from(client),
                provider_config.model_prefixes.clone(),
                provider_config.default,
            );
        }
        Ok(registry)
    }

    /// Register a client under `name`
    pub fn register(
        &mut self,
        name: &str,
        client: Arc<dyn LLMClient>,
        model_prefixes: Vec<String>,
        default: bool,
    ) {
        if default {
            self.default_provider = Some(name.to_string());
        }
        self.providers.insert(
            name.to_string(),
            RegisteredProvider {
                client,
                model_prefixes,
            },
        );
    }

    /// Name of the provider that serves `model`
    pub fn provider_for_model(&self, model: &str) -> Option<&str> {
        let candidates = self.providers.iter().flat_map(|(name, provider)| {
            provider
                .model_prefixes
                .iter()
                .map(move |prefix| (prefix.as_str(), name.as_str()))
        });
        longest_prefix_match(model, candidates).or(self.default_provider.as_deref())
    }

    /// Client that serves `model`
    pub fn client_for_model(&self, model: &str) -> Result<Arc<dyn LLMClient>> {
        let name = self.provider_for_model(model).ok_or_else(|| {
            AppError::Configuration(format!("No provider configured for model '{}'", model))
        })?;
        self.providers
            .get(name)
            .map(|provider| Arc::clone(&provider.client))
            .ok_or_else(|| AppError::Configuration(format!("Provider '{}' not registered", name)))
    }

    /// Get all provider names
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::{ChatRequest, ChatResponse, ProviderError};
    use async_trait::async_trait;

    struct NamedClient(&'static str);

    #[async_trait]
    impl LLMClient for NamedClient {
        async fn chat(&self, _request: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            Ok(ChatResponse::default())
        }

        fn provider_name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_longest_prefix_wins() {
        let candidates = vec![("gpt-", "a"), ("gpt-4o", "b"), ("", "c")];
        assert_eq!(longest_prefix_match("gpt-4o-mini", candidates.clone()), Some("b"));
        assert_eq!(longest_prefix_match("gpt-3.5", candidates.clone()), Some("a"));
        assert_eq!(longest_prefix_match("claude", candidates), None);
    }

    #[test]
    fn test_client_for_model() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            "openai",
            Arc::new(NamedClient("openai")),
            vec!["gpt-".into()],
            true,
        );
        registry.register(
            "gemini",
            Arc::new(NamedClient("gemini")),
            vec!["gemini-".into()],
            false,
        );

        let client = registry.client_for_model("gemini-2.0-flash").unwrap();
        assert_eq!(client.provider_name(), "gemini");
        let client = registry.client_for_model("o1-preview").unwrap();
        assert_eq!(client.provider_name(), "openai");
    }

    #[test]
    fn test_no_provider_is_configuration_error() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            "gemini",
            Arc::new(NamedClient("gemini")),
            vec!["gemini-".into()],
            false,
        );
        assert!(matches!(
            registry.client_for_model("gpt-4o"),
            Err(AppError::Configuration(_))
        ));
    }
}
