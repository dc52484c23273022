use std::sync::Arc;

use crate::error::ModelError;
use crate::model_registry::ModelRegistry;
use crate::types::{ModelProvider, ModelWithConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAvailableModelQuery {
    pub name: String,
    pub provider: ModelProvider,
}

impl GetAvailableModelQuery {
    pub fn new(name: impl Into<String>, provider: ModelProvider) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GetAvailableModelUseCase {
    registry: Arc<ModelRegistry>,
}

impl GetAvailableModelUseCase {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn execute(&self, query: &GetAvailableModelQuery) -> Result<ModelWithConfig, ModelError> {
        self.registry.get_model(&query.name, query.provider)
    }
}

#[derive(Debug, Clone)]
pub struct GetAvailableModelsUseCase {
    registry: Arc<ModelRegistry>,
}

impl GetAvailableModelsUseCase {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn execute(&self) -> Vec<ModelWithConfig> {
        self.registry.get_all()
    }
}
