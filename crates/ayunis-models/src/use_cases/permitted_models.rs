use std::sync::Arc;

use crate::error::ModelError;
use crate::repositories::{PermittedModel, PermittedModelsRepository};
use crate::types::ModelProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetPermittedModelQuery {
    ById(String),
    ByName {
        org_id: String,
        name: String,
        provider: ModelProvider,
    },
}

pub struct GetPermittedModelUseCase {
    repository: Arc<dyn PermittedModelsRepository>,
}

impl GetPermittedModelUseCase {
    pub fn new(repository: Arc<dyn PermittedModelsRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(
        &self,
        query: &GetPermittedModelQuery,
    ) -> Result<PermittedModel, ModelError> {
        match query {
            GetPermittedModelQuery::ById(id) => self
                .repository
                .find_by_id(id)
                .await?
                .ok_or_else(|| ModelError::permitted_model_not_found_by_id(id)),
            GetPermittedModelQuery::ByName {
                org_id,
                name,
                provider,
            } => self
                .repository
                .find_one(org_id, name, *provider)
                .await?
                .ok_or_else(|| ModelError::permitted_model_not_found(name, *provider)),
        }
    }
}

pub struct GetPermittedModelsUseCase {
    repository: Arc<dyn PermittedModelsRepository>,
}

impl GetPermittedModelsUseCase {
    pub fn new(repository: Arc<dyn PermittedModelsRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, org_id: &str) -> Result<Vec<PermittedModel>, ModelError> {
        self.repository.find_all(org_id).await
    }
}

pub struct IsModelPermittedUseCase {
    repository: Arc<dyn PermittedModelsRepository>,
}

impl IsModelPermittedUseCase {
    pub fn new(repository: Arc<dyn PermittedModelsRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(
        &self,
        org_id: &str,
        name: &str,
        provider: ModelProvider,
    ) -> Result<bool, ModelError> {
        Ok(self
            .repository
            .find_one(org_id, name, provider)
            .await?
            .is_some())
    }
}
