use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::types::{Model, ModelProvider};

/// A catalog model an organisation has enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermittedModel {
    pub id: String,
    #[serde(rename = "orgId")]
    pub org_id: String,
    pub model: Model,
    #[serde(rename = "isDefault")]
    pub is_default: bool,
}

#[async_trait]
pub trait PermittedModelsRepository: Send + Sync {
    async fn find_all(&self, org_id: &str) -> Result<Vec<PermittedModel>, ModelError>;

    async fn find_one(
        &self,
        org_id: &str,
        name: &str,
        provider: ModelProvider,
    ) -> Result<Option<PermittedModel>, ModelError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<PermittedModel>, ModelError>;

    async fn find_org_default(&self, org_id: &str) -> Result<Option<PermittedModel>, ModelError>;
}

#[async_trait]
pub trait UserDefaultModelsRepository: Send + Sync {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<PermittedModel>, ModelError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPermittedModelsRepository {
    models: RwLock<Vec<PermittedModel>>,
}

impl InMemoryPermittedModelsRepository {
    pub fn new(models: Vec<PermittedModel>) -> Self {
        Self {
            models: RwLock::new(models),
        }
    }

    pub fn insert(&self, model: PermittedModel) {
        let mut models = self.models.write().expect("permitted models lock poisoned");
        models.retain(|existing| existing.id != model.id);
        models.push(model);
    }

    pub fn remove(&self, id: &str) {
        self.models
            .write()
            .expect("permitted models lock poisoned")
            .retain(|existing| existing.id != id);
    }

    fn find(&self, predicate: impl Fn(&PermittedModel) -> bool) -> Option<PermittedModel> {
        self.models
            .read()
            .expect("permitted models lock poisoned")
            .iter()
            .find(|model| predicate(model))
            .cloned()
    }
}

#[async_trait]
impl PermittedModelsRepository for InMemoryPermittedModelsRepository {
    async fn find_all(&self, org_id: &str) -> Result<Vec<PermittedModel>, ModelError> {
        Ok(self
            .models
            .read()
            .expect("permitted models lock poisoned")
            .iter()
            .filter(|model| model.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn find_one(
        &self,
        org_id: &str,
        name: &str,
        provider: ModelProvider,
    ) -> Result<Option<PermittedModel>, ModelError> {
        Ok(self.find(|model| {
            model.org_id == org_id && model.model.name == name && model.model.provider == provider
        }))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PermittedModel>, ModelError> {
        Ok(self.find(|model| model.id == id))
    }

    async fn find_org_default(&self, org_id: &str) -> Result<Option<PermittedModel>, ModelError> {
        Ok(self.find(|model| model.org_id == org_id && model.is_default))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserDefaultModelsRepository {
    defaults: RwLock<HashMap<String, PermittedModel>>,
}

impl InMemoryUserDefaultModelsRepository {
    pub fn set_default(&self, user_id: impl Into<String>, model: PermittedModel) {
        self.defaults
            .write()
            .expect("user defaults lock poisoned")
            .insert(user_id.into(), model);
    }

    pub fn clear_default(&self, user_id: &str) {
        self.defaults
            .write()
            .expect("user defaults lock poisoned")
            .remove(user_id);
    }
}

#[async_trait]
impl UserDefaultModelsRepository for InMemoryUserDefaultModelsRepository {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<PermittedModel>, ModelError> {
        Ok(self
            .defaults
            .read()
            .expect("user defaults lock poisoned")
            .get(user_id)
            .cloned())
    }
}
