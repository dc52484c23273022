use std::sync::Arc;

use tracing::debug;

use crate::error::ModelError;
use crate::repositories::{
    PermittedModel, PermittedModelsRepository, UserDefaultModelsRepository,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDefaultModelQuery {
    pub org_id: String,
    pub user_id: Option<String>,
}

impl GetDefaultModelQuery {
    pub fn for_org(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: None,
        }
    }

    pub fn for_user(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: Some(user_id.into()),
        }
    }
}

/// Resolves the model a new thread starts with: the user's own default if
/// it is still permitted, then the organisation default, then any permitted
/// model.
pub struct GetDefaultModelUseCase {
    permitted_models: Arc<dyn PermittedModelsRepository>,
    user_defaults: Arc<dyn UserDefaultModelsRepository>,
}

impl GetDefaultModelUseCase {
    pub fn new(
        permitted_models: Arc<dyn PermittedModelsRepository>,
        user_defaults: Arc<dyn UserDefaultModelsRepository>,
    ) -> Self {
        Self {
            permitted_models,
            user_defaults,
        }
    }

    pub async fn execute(
        &self,
        query: &GetDefaultModelQuery,
    ) -> Result<PermittedModel, ModelError> {
        if let Some(user_id) = &query.user_id {
            if let Some(user_default) = self.user_defaults.find_by_user(user_id).await? {
                let still_permitted = self
                    .permitted_models
                    .find_by_id(&user_default.id)
                    .await?
                    .filter(|model| model.org_id == query.org_id);
                if let Some(model) = still_permitted {
                    return Ok(model);
                }
                debug!(
                    user_id = %user_id,
                    model_id = %user_default.id,
                    "user default model is no longer permitted"
                );
            }
        }

        if let Some(model) = self.permitted_models.find_org_default(&query.org_id).await? {
            return Ok(model);
        }

        self.permitted_models
            .find_all(&query.org_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::default_model_not_found(&query.org_id))
    }
}
