use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::available_models::{GetAvailableModelQuery, GetAvailableModelUseCase};
use crate::error::ModelError;
use crate::message::Message;
use crate::model_registry::ModelRegistry;
use crate::registry::InferenceHandlerRegistry;
use crate::types::{
    InferenceInput, InferenceResponse, Model, ModelProvider, Tool, ToolChoice,
};

#[derive(Debug, Clone, PartialEq)]
pub struct GetInferenceCommand {
    pub model_name: String,
    pub model_provider: ModelProvider,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub tool_choice: Option<ToolChoice>,
    pub timeout: Option<Duration>,
}

impl GetInferenceCommand {
    pub fn new(model: Model, messages: Vec<Message>) -> Self {
        Self {
            model_name: model.name,
            model_provider: model.provider,
            messages,
            tools: Vec::new(),
            tool_choice: None,
            timeout: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(super) fn into_input(self, model: Model) -> InferenceInput {
        InferenceInput {
            model,
            messages: self.messages,
            tools: self.tools,
            tool_choice: self.tool_choice,
            timeout: self.timeout,
        }
    }
}

pub struct GetInferenceUseCase {
    available_model: GetAvailableModelUseCase,
    handlers: Arc<InferenceHandlerRegistry>,
}

impl GetInferenceUseCase {
    pub fn new(models: Arc<ModelRegistry>, handlers: Arc<InferenceHandlerRegistry>) -> Self {
        Self {
            available_model: GetAvailableModelUseCase::new(models),
            handlers,
        }
    }

    pub async fn execute(
        &self,
        command: GetInferenceCommand,
    ) -> Result<InferenceResponse, ModelError> {
        let model = self.available_model.execute(&GetAvailableModelQuery::new(
            command.model_name.clone(),
            command.model_provider,
        ))?;
        let handler = self.handlers.get(model.model.provider)?;
        info!(
            model = %model.model.name,
            provider = %model.model.provider,
            "dispatching inference"
        );
        handler.answer(command.into_input(model.model)).await
    }
}
