//! Provider-agnostic LLM inference for Mistral, OpenAI and Anthropic.

mod error;
mod handler;
mod message;
mod model_registry;
mod providers;
mod registry;
mod repositories;
mod retry;
mod types;
mod use_cases;
mod validation;

pub use error::{ModelError, ModelErrorCode};
pub use handler::{InferenceHandler, InferenceStream, StreamInferenceHandler};
pub use message::{
    needs_awaiting_user_input, AssistantContent, Message, MessageRole, TextContent,
    ToolResultContent, ToolUseContent, AWAITING_USER_INPUT, TOOL_DISPLAYED_ACKNOWLEDGEMENT,
};
pub use model_registry::{builtin_models, ModelRegistry};
pub use providers::{
    build_handler_registries, build_inference_handlers, build_stream_inference_handlers,
    AnthropicInferenceHandler, InferenceSettings, MistralInferenceHandler,
    OpenAiInferenceHandler, ProviderSettings, DEFAULT_REQUEST_TIMEOUT,
};
pub use registry::{HandlerRegistry, InferenceHandlerRegistry, StreamInferenceHandlerRegistry};
pub use repositories::{
    InMemoryPermittedModelsRepository, InMemoryUserDefaultModelsRepository, PermittedModel,
    PermittedModelsRepository, UserDefaultModelsRepository,
};
pub use retry::{
    retry_with_backoff, retry_with_deadline, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY,
    DEFAULT_MAX_RETRIES,
};
pub use types::{
    InferenceInput, InferenceMeta, InferenceResponse, Model, ModelConfig, ModelProvider,
    ModelWithConfig, StreamInferenceChunk, Tool, ToolChoice,
};
pub use use_cases::{
    GetAvailableModelQuery, GetAvailableModelUseCase, GetAvailableModelsUseCase,
    GetDefaultModelQuery, GetDefaultModelUseCase, GetInferenceCommand, GetInferenceUseCase,
    GetPermittedModelQuery, GetPermittedModelUseCase, GetPermittedModelsUseCase,
    IsModelPermittedUseCase, StreamInferenceCommand, StreamInferenceUseCase,
};
pub use validation::{validate_inference_input, validate_tool_use};
