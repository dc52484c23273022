mod parser;
mod payload;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, info};

use self::parser::{parse_anthropic_response, AnthropicStreamParser};
use self::payload::build_anthropic_payload;
use super::common::{build_http_client, join_url, read_json_body, send_request};
use super::sse::sse_chunk_stream;
use super::ProviderSettings;
use crate::error::ModelError;
use crate::handler::{InferenceHandler, InferenceStream, StreamInferenceHandler};
use crate::retry::{retry_with_deadline, RetryPolicy};
use crate::types::{InferenceInput, InferenceResponse, ModelProvider};
use crate::validation::validate_inference_input;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 4_096;

pub struct AnthropicInferenceHandler {
    client: Client,
    url: String,
    api_key: String,
    timeout: Duration,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl AnthropicInferenceHandler {
    pub fn new(settings: ProviderSettings, retry: RetryPolicy) -> Self {
        let base_url = settings.base_url_or(ANTHROPIC_BASE_URL).to_string();
        Self {
            client: build_http_client(&base_url),
            url: join_url(&base_url, "messages"),
            api_key: settings.api_key,
            timeout: settings.timeout,
            max_tokens: settings.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
            retry,
        }
    }

    fn request(&self, payload: &Value) -> RequestBuilder {
        self.client
            .post(self.url.as_str())
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(payload)
    }

    async fn send(&self, payload: &Value, deadline: Duration) -> Result<Response, ModelError> {
        retry_with_deadline(&self.retry, deadline, || {
            send_request(ModelProvider::Anthropic, self.request(payload))
        })
        .await
    }
}

#[async_trait]
impl InferenceHandler for AnthropicInferenceHandler {
    fn provider(&self) -> ModelProvider {
        ModelProvider::Anthropic
    }

    async fn answer(&self, input: InferenceInput) -> Result<InferenceResponse, ModelError> {
        validate_inference_input(&input)?;
        let payload = build_anthropic_payload(&input, self.max_tokens, false);
        info!(
            model = %input.model.name,
            messages = input.messages.len(),
            tools = input.tools.len(),
            "Anthropic inference request"
        );
        debug!("Anthropic payload: {}", payload);

        let deadline = input.timeout.unwrap_or(self.timeout);
        let payload = &payload;
        let body = retry_with_deadline(&self.retry, deadline, || async move {
            let response = send_request(ModelProvider::Anthropic, self.request(payload)).await?;
            read_json_body(ModelProvider::Anthropic, response).await
        })
        .await?;

        parse_anthropic_response(&body)
    }
}

#[async_trait]
impl StreamInferenceHandler for AnthropicInferenceHandler {
    fn provider(&self) -> ModelProvider {
        ModelProvider::Anthropic
    }

    async fn stream(&self, input: InferenceInput) -> Result<InferenceStream, ModelError> {
        validate_inference_input(&input)?;
        let payload = build_anthropic_payload(&input, self.max_tokens, true);
        info!(
            model = %input.model.name,
            messages = input.messages.len(),
            tools = input.tools.len(),
            "Anthropic streaming request"
        );
        debug!("Anthropic stream payload: {}", payload);

        let deadline = input.timeout.unwrap_or(self.timeout);
        let response = self.send(&payload, deadline).await?;
        Ok(sse_chunk_stream(
            ModelProvider::Anthropic,
            response,
            AnthropicStreamParser::default(),
        ))
    }
}
