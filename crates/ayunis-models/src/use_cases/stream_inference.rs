use std::sync::Arc;

use tracing::info;

use super::available_models::{GetAvailableModelQuery, GetAvailableModelUseCase};
use super::get_inference::GetInferenceCommand;
use crate::error::ModelError;
use crate::handler::InferenceStream;
use crate::model_registry::ModelRegistry;
use crate::registry::StreamInferenceHandlerRegistry;

/// Streaming takes the same command as a plain inference.
pub type StreamInferenceCommand = GetInferenceCommand;

pub struct StreamInferenceUseCase {
    available_model: GetAvailableModelUseCase,
    handlers: Arc<StreamInferenceHandlerRegistry>,
}

impl StreamInferenceUseCase {
    pub fn new(
        models: Arc<ModelRegistry>,
        handlers: Arc<StreamInferenceHandlerRegistry>,
    ) -> Self {
        Self {
            available_model: GetAvailableModelUseCase::new(models),
            handlers,
        }
    }

    pub async fn execute(
        &self,
        command: StreamInferenceCommand,
    ) -> Result<InferenceStream, ModelError> {
        let model = self.available_model.execute(&GetAvailableModelQuery::new(
            command.model_name.clone(),
            command.model_provider,
        ))?;
        if !model.config.can_stream {
            return Err(ModelError::model_invalid(format!(
                "model '{}' does not support streaming",
                model.model.name
            )));
        }
        let handler = self.handlers.get(model.model.provider)?;
        info!(
            model = %model.model.name,
            provider = %model.model.provider,
            "dispatching streaming inference"
        );
        handler.stream(command.into_input(model.model)).await
    }
}
