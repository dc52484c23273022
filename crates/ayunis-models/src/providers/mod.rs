mod anthropic;
mod chat_completions;
mod common;
mod mistral;
mod openai;
mod sse;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::registry::{InferenceHandlerRegistry, StreamInferenceHandlerRegistry};
use crate::retry::RetryPolicy;
use crate::types::ModelProvider;

pub use anthropic::AnthropicInferenceHandler;
pub use mistral::MistralInferenceHandler;
pub use openai::OpenAiInferenceHandler;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for one vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: String,
    /// Overrides the vendor's public endpoint, e.g. for a proxy.
    pub base_url: Option<String>,
    /// Default deadline per call when the input carries none.
    pub timeout: Duration,
    pub max_tokens: Option<u32>,
}

impl ProviderSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_tokens: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(default)
    }
}

/// Everything needed to build the handler registries at startup. Vendors
/// without settings are left unregistered.
#[derive(Debug, Clone, Default)]
pub struct InferenceSettings {
    pub mistral: Option<ProviderSettings>,
    pub openai: Option<ProviderSettings>,
    pub anthropic: Option<ProviderSettings>,
    pub retry: RetryPolicy,
}

/// Builds both registries, sharing one handler instance per vendor.
pub fn build_handler_registries(
    settings: &InferenceSettings,
) -> (InferenceHandlerRegistry, StreamInferenceHandlerRegistry) {
    let mut inference = InferenceHandlerRegistry::new();
    let mut streaming = StreamInferenceHandlerRegistry::new();

    if let Some(mistral) = &settings.mistral {
        let handler = Arc::new(MistralInferenceHandler::new(mistral.clone(), settings.retry));
        inference.register(ModelProvider::Mistral, handler);
    }
    if let Some(openai) = &settings.openai {
        let handler = Arc::new(OpenAiInferenceHandler::new(openai.clone(), settings.retry));
        inference.register(ModelProvider::OpenAi, handler.clone());
        streaming.register(ModelProvider::OpenAi, handler);
    }
    if let Some(anthropic) = &settings.anthropic {
        let handler = Arc::new(AnthropicInferenceHandler::new(
            anthropic.clone(),
            settings.retry,
        ));
        inference.register(ModelProvider::Anthropic, handler.clone());
        streaming.register(ModelProvider::Anthropic, handler);
    }

    info!(
        inference = ?inference.providers(),
        streaming = ?streaming.providers(),
        "built inference handler registries"
    );
    (inference, streaming)
}

pub fn build_inference_handlers(settings: &InferenceSettings) -> InferenceHandlerRegistry {
    build_handler_registries(settings).0
}

pub fn build_stream_inference_handlers(
    settings: &InferenceSettings,
) -> StreamInferenceHandlerRegistry {
    build_handler_registries(settings).1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configured_vendors_are_registered() {
        let settings = InferenceSettings {
            mistral: Some(ProviderSettings::new("m-key")),
            anthropic: Some(ProviderSettings::new("a-key")),
            ..InferenceSettings::default()
        };

        let (inference, streaming) = build_handler_registries(&settings);
        assert_eq!(
            inference.providers(),
            vec![ModelProvider::Mistral, ModelProvider::Anthropic]
        );
        assert_eq!(streaming.providers(), vec![ModelProvider::Anthropic]);
    }

    #[test]
    fn mistral_is_never_a_streaming_handler() {
        let settings = InferenceSettings {
            mistral: Some(ProviderSettings::new("m-key")),
            openai: Some(ProviderSettings::new("o-key")),
            ..InferenceSettings::default()
        };
        let streaming = build_stream_inference_handlers(&settings);
        assert!(!streaming.contains(ModelProvider::Mistral));
        assert!(streaming.contains(ModelProvider::OpenAi));
        assert!(build_inference_handlers(&settings).contains(ModelProvider::Mistral));
    }

    #[test]
    fn blank_base_url_falls_back_to_default() {
        let settings = ProviderSettings::new("key").with_base_url("  ");
        assert_eq!(settings.base_url_or("https://api.openai.com/v1"), "https://api.openai.com/v1");
    }
}
