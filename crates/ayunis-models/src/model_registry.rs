use crate::error::ModelError;
use crate::types::{Model, ModelConfig, ModelProvider, ModelWithConfig};

/// Catalog of models the deployment can serve, independent of which
/// organisations are permitted to use them.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelWithConfig>,
}

impl ModelRegistry {
    /// Later entries with the same name and provider replace earlier ones.
    pub fn new(models: impl IntoIterator<Item = ModelWithConfig>) -> Self {
        let mut registry = Self::default();
        for model in models {
            registry.insert(model);
        }
        registry
    }

    pub fn builtin() -> Self {
        Self::new(builtin_models())
    }

    pub fn insert(&mut self, model: ModelWithConfig) {
        if let Some(existing) = self.models.iter_mut().find(|existing| {
            existing.model.name == model.model.name
                && existing.model.provider == model.model.provider
        }) {
            *existing = model;
        } else {
            self.models.push(model);
        }
    }

    pub fn get_model(
        &self,
        name: &str,
        provider: ModelProvider,
    ) -> Result<ModelWithConfig, ModelError> {
        self.models
            .iter()
            .find(|entry| entry.model.name == name && entry.model.provider == provider)
            .cloned()
            .ok_or_else(|| ModelError::model_not_found(name, provider))
    }

    pub fn get_all(&self) -> Vec<ModelWithConfig> {
        self.models.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

pub fn builtin_models() -> Vec<ModelWithConfig> {
    [
        ("mistral-large-latest", ModelProvider::Mistral, "Mistral Large", false, false),
        ("mistral-small-latest", ModelProvider::Mistral, "Mistral Small", false, false),
        ("gpt-4o", ModelProvider::OpenAi, "GPT-4o", true, false),
        ("gpt-4o-mini", ModelProvider::OpenAi, "GPT-4o mini", true, false),
        ("o3-mini", ModelProvider::OpenAi, "o3-mini", true, true),
        ("claude-3-7-sonnet-latest", ModelProvider::Anthropic, "Claude 3.7 Sonnet", true, false),
        ("claude-3-5-haiku-latest", ModelProvider::Anthropic, "Claude 3.5 Haiku", true, false),
    ]
    .into_iter()
    .map(|(name, provider, display_name, can_stream, is_reasoning)| ModelWithConfig {
        model: Model::new(name, provider),
        config: ModelConfig {
            display_name: display_name.to_string(),
            can_stream,
            is_reasoning,
        },
    })
    .collect()
}
