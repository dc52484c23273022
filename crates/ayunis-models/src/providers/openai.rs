use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::chat_completions::{
    build_chat_payload, parse_chat_completion, parse_usage, ChatDialect,
};
use super::common::{build_http_client, join_url, read_json_body, send_request};
use super::sse::{sse_chunk_stream, SseEvent, SseEventParser};
use super::ProviderSettings;
use crate::error::ModelError;
use crate::handler::{InferenceHandler, InferenceStream, StreamInferenceHandler};
use crate::retry::{retry_with_deadline, RetryPolicy};
use crate::types::{
    InferenceInput, InferenceMeta, InferenceResponse, ModelProvider, StreamInferenceChunk,
};
use crate::validation::validate_inference_input;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const DIALECT: ChatDialect = ChatDialect::OpenAi;

pub struct OpenAiInferenceHandler {
    client: Client,
    url: String,
    api_key: String,
    timeout: Duration,
    max_tokens: Option<u32>,
    retry: RetryPolicy,
}

impl OpenAiInferenceHandler {
    pub fn new(settings: ProviderSettings, retry: RetryPolicy) -> Self {
        let base_url = settings.base_url_or(OPENAI_BASE_URL).to_string();
        Self {
            client: build_http_client(&base_url),
            url: join_url(&base_url, "chat/completions"),
            api_key: settings.api_key,
            timeout: settings.timeout,
            max_tokens: settings.max_tokens,
            retry,
        }
    }

    fn build_payload(&self, input: &InferenceInput, stream: bool) -> Value {
        let mut payload = build_chat_payload(DIALECT, input, self.max_tokens);
        if stream {
            payload["stream"] = Value::Bool(true);
            payload["stream_options"] = json!({ "include_usage": true });
        }
        payload
    }

    fn request(&self, payload: &Value) -> RequestBuilder {
        self.client
            .post(self.url.as_str())
            .bearer_auth(self.api_key.as_str())
            .json(payload)
    }

    async fn send(&self, payload: &Value, deadline: Duration) -> Result<Response, ModelError> {
        retry_with_deadline(&self.retry, deadline, || {
            send_request(DIALECT.provider(), self.request(payload))
        })
        .await
    }
}

#[async_trait]
impl InferenceHandler for OpenAiInferenceHandler {
    fn provider(&self) -> ModelProvider {
        DIALECT.provider()
    }

    async fn answer(&self, input: InferenceInput) -> Result<InferenceResponse, ModelError> {
        validate_inference_input(&input)?;
        let payload = self.build_payload(&input, false);
        info!(
            model = %input.model.name,
            messages = input.messages.len(),
            tools = input.tools.len(),
            "OpenAI inference request"
        );
        debug!("OpenAI payload: {}", payload);

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

#[async_trait]
impl StreamInferenceHandler for OpenAiInferenceHandler {
    fn provider(&self) -> ModelProvider {
        DIALECT.provider()
    }

    async fn stream(&self, input: InferenceInput) -> Result<InferenceStream, ModelError> {
        validate_inference_input(&input)?;
        let payload = self.build_payload(&input, true);
        info!(
            model = %input.model.name,
            messages = input.messages.len(),
            tools = input.tools.len(),
            "OpenAI streaming request"
        );
        debug!("OpenAI stream payload: {}", payload);

        let deadline = input.timeout.unwrap_or(self.timeout);
        let response = self.send(&payload, deadline).await?;
        Ok(sse_chunk_stream(
            DIALECT.provider(),
            response,
            OpenAiStreamParser::default(),
        ))
    }
}

#[derive(Debug, Default)]
struct OpenAiStreamParser {
    finish_reason: Option<String>,
    meta: InferenceMeta,
    finished: bool,
}

impl SseEventParser for OpenAiStreamParser {
    fn on_event(&mut self, event: &SseEvent) -> Result<Vec<StreamInferenceChunk>, ModelError> {
        if event.data == "[DONE]" {
            self.finished = true;
            return Ok(vec![StreamInferenceChunk::Finished {
                finish_reason: self.finish_reason.take(),
                meta: std::mem::take(&mut self.meta),
            }]);
        }

        let value: Value = serde_json::from_str(&event.data).map_err(|error| {
            ModelError::inference_failed(format!("OpenAI stream chunk is not valid JSON: {error}"))
                .with_metadata(json!({ "source": "openai", "data": event.data }))
        })?;
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown stream error");
            return Err(ModelError::inference_failed(message)
                .with_metadata(json!({ "source": "openai", "error": error })));
        }

        if let Some(usage) = value.get("usage").filter(|usage| usage.is_object()) {
            self.meta = parse_usage(Some(usage));
        }

        let mut chunks = Vec::new();
        let choices = value
            .get("choices")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for choice in choices {
            if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
                self.finish_reason = Some(reason.to_string());
            }
            let Some(delta) = choice.get("delta") else {
                continue;
            };
            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                if !text.is_empty() {
                    chunks.push(StreamInferenceChunk::TextDelta {
                        delta: text.to_string(),
                    });
                }
            }
            for tool_call in delta
                .get("tool_calls")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
            {
                let function = tool_call.get("function");
                let text_field = |value: Option<&Value>| {
                    value
                        .and_then(Value::as_str)
                        .filter(|text| !text.is_empty())
                        .map(str::to_string)
                };
                chunks.push(StreamInferenceChunk::ToolCallDelta {
                    index: tool_call.get("index").and_then(Value::as_u64).unwrap_or(0) as usize,
                    id: text_field(tool_call.get("id")),
                    name: text_field(function.and_then(|function| function.get("name"))),
                    arguments_delta: text_field(
                        function.and_then(|function| function.get("arguments")),
                    ),
                });
            }
        }
        Ok(chunks)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
