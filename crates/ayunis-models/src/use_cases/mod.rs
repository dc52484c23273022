mod available_models;
mod default_model;
mod get_inference;
mod permitted_models;
mod stream_inference;

pub use available_models::{
    GetAvailableModelQuery, GetAvailableModelUseCase, GetAvailableModelsUseCase,
};
pub use default_model::{GetDefaultModelQuery, GetDefaultModelUseCase};
pub use get_inference::{GetInferenceCommand, GetInferenceUseCase};
pub use permitted_models::{
    GetPermittedModelQuery, GetPermittedModelUseCase, GetPermittedModelsUseCase,
    IsModelPermittedUseCase,
};
pub use stream_inference::{StreamInferenceCommand, StreamInferenceUseCase};
