use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ModelProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelErrorCode {
    ModelNotFound,
    #[serde(rename = "NO_DEFAULT_MODEL_FOUND")]
    DefaultModelNotFound,
    ModelInvalid,
    ModelProviderNotSupported,
    InferenceFailed,
    InferenceInputInvalid,
    InferenceTimeout,
    ModelRateLimitExceeded,
}

impl ModelErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModelNotFound => "MODEL_NOT_FOUND",
            Self::DefaultModelNotFound => "NO_DEFAULT_MODEL_FOUND",
            Self::ModelInvalid => "MODEL_INVALID",
            Self::ModelProviderNotSupported => "MODEL_PROVIDER_NOT_SUPPORTED",
            Self::InferenceFailed => "INFERENCE_FAILED",
            Self::InferenceInputInvalid => "INFERENCE_INPUT_INVALID",
            Self::InferenceTimeout => "INFERENCE_TIMEOUT",
            Self::ModelRateLimitExceeded => "MODEL_RATE_LIMIT_EXCEEDED",
        }
    }

    /// HTTP status an outer layer should answer with.
    pub fn status_code(self) -> u16 {
        match self {
            Self::ModelNotFound | Self::DefaultModelNotFound => 404,
            Self::ModelInvalid | Self::ModelProviderNotSupported | Self::InferenceInputInvalid => {
                400
            }
            Self::InferenceFailed => 500,
            Self::InferenceTimeout => 408,
            Self::ModelRateLimitExceeded => 429,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelError {
    pub code: ModelErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip)]
    transient: bool,
}

impl ModelError {
    pub fn new(code: ModelErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            metadata: None,
            transient: false,
        }
    }

    pub fn model_not_found(name: &str, provider: ModelProvider) -> Self {
        Self::new(
            ModelErrorCode::ModelNotFound,
            format!("Model '{name}' not found for provider '{provider}'"),
        )
    }

    pub fn permitted_model_not_found(name: &str, provider: ModelProvider) -> Self {
        Self::new(
            ModelErrorCode::ModelNotFound,
            format!("Permitted model '{name}' with provider '{provider}' not found"),
        )
    }

    pub fn permitted_model_not_found_by_id(id: &str) -> Self {
        Self::new(
            ModelErrorCode::ModelNotFound,
            format!("Permitted model '{id}' not found"),
        )
    }

    pub fn default_model_not_found(org_id: &str) -> Self {
        Self::new(
            ModelErrorCode::DefaultModelNotFound,
            format!("Default model not found for org '{org_id}'"),
        )
    }

    pub fn model_invalid(reason: impl Display) -> Self {
        Self::new(
            ModelErrorCode::ModelInvalid,
            format!("Invalid model: {reason}"),
        )
    }

    pub fn provider_not_supported(provider: impl Display) -> Self {
        Self::new(
            ModelErrorCode::ModelProviderNotSupported,
            format!("Model provider '{provider}' is not supported"),
        )
    }

    pub fn inference_failed(reason: impl Display) -> Self {
        Self::new(
            ModelErrorCode::InferenceFailed,
            format!("Inference failed: {reason}"),
        )
    }

    pub fn inference_input_invalid(reason: impl Display) -> Self {
        Self::new(
            ModelErrorCode::InferenceInputInvalid,
            format!("Invalid inference input: {reason}"),
        )
    }

    pub fn inference_timeout(timeout_ms: u64) -> Self {
        Self::new(
            ModelErrorCode::InferenceTimeout,
            format!("Inference timed out after {timeout_ms}ms"),
        )
    }

    /// Rate limits are always worth another attempt.
    pub fn rate_limit_exceeded(provider: ModelProvider) -> Self {
        Self::new(
            ModelErrorCode::ModelRateLimitExceeded,
            format!("Rate limit exceeded for provider '{provider}'"),
        )
        .transient()
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Marks the failure as retryable by [`crate::retry_with_backoff`].
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }

    pub fn as_compact_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"code\":\"{}\",\"message\":\"{}\"}}",
                self.code.as_str(),
                self.message.replace('\"', "\\\"")
            )
        })
    }
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ModelError {}
