use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info};

use super::chat_completions::{build_chat_payload, parse_chat_completion, ChatDialect};
use super::common::{build_http_client, join_url, read_json_body, send_request};
use super::ProviderSettings;
use crate::error::ModelError;
use crate::handler::InferenceHandler;
use crate::retry::{retry_with_deadline, RetryPolicy};
use crate::types::{InferenceInput, InferenceResponse, ModelProvider};
use crate::validation::validate_inference_input;

pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const MISTRAL_DEFAULT_MAX_TOKENS: u32 = 1_000;

const DIALECT: ChatDialect = ChatDialect::Mistral;

/// Mistral chat completions. Mistral has no streaming handler.
pub struct MistralInferenceHandler {
    client: Client,
    url: String,
    api_key: String,
    timeout: Duration,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl MistralInferenceHandler {
    pub fn new(settings: ProviderSettings, retry: RetryPolicy) -> Self {
        let base_url = settings.base_url_or(MISTRAL_BASE_URL).to_string();
        Self {
            client: build_http_client(&base_url),
            url: join_url(&base_url, "chat/completions"),
            api_key: settings.api_key,
            timeout: settings.timeout,
            max_tokens: settings.max_tokens.unwrap_or(MISTRAL_DEFAULT_MAX_TOKENS),
            retry,
        }
    }

    fn request(&self, payload: &Value) -> RequestBuilder {
        self.client
            .post(self.url.as_str())
            .bearer_auth(self.api_key.as_str())
            .json(payload)
    }
}

#[async_trait]
impl InferenceHandler for MistralInferenceHandler {
    fn provider(&self) -> ModelProvider {
        DIALECT.provider()
    }

    async fn answer(&self, input: InferenceInput) -> Result<InferenceResponse, ModelError> {
        validate_inference_input(&input)?;
        let payload = build_chat_payload(DIALECT, &input, Some(self.max_tokens));
        info!(
            model = %input.model.name,
            messages = input.messages.len(),
            tools = input.tools.len(),
            "Mistral inference request"
        );
        debug!("Mistral payload: {}", payload);

        let deadline = input.timeout.unwrap_or(self.timeout);
        let payload = &payload;
        let body = retry_with_deadline(&self.retry, deadline, || async move {
            let response = send_request(DIALECT.provider(), self.request(payload)).await?;
            read_json_body(DIALECT.provider(), response).await
        })
        .await?;

        parse_chat_completion(DIALECT.provider(), &body)
    }
}
