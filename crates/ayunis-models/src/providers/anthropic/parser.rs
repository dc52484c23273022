use serde_json::{json, Value};
use tracing::debug;

use crate::error::ModelError;
use crate::message::AssistantContent;
use crate::providers::chat_completions::normalize_tool_arguments;
use crate::providers::sse::{SseEvent, SseEventParser};
use crate::types::{InferenceMeta, InferenceResponse, ModelProvider, StreamInferenceChunk};

pub(super) fn parse_anthropic_response(body: &Value) -> Result<InferenceResponse, ModelError> {
    let Some(blocks) = body.get("content").and_then(Value::as_array) else {
        return Err(
            ModelError::inference_failed("No completion returned from model")
                .with_metadata(json!({ "source": "anthropic" })),
        );
    };

    let mut content = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
                if !text.is_empty() {
                    content.push(AssistantContent::text(text));
                }
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .unwrap_or("none");
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                let params = normalize_tool_arguments(name, block.get("input"))?;
                content.push(AssistantContent::tool_use(id, name, params));
            }
            _ => {}
        }
    }

    let mut meta = InferenceMeta::default();
    update_usage(&mut meta, body.get("usage"));
    Ok(InferenceResponse { content, meta })
}

fn update_usage(meta: &mut InferenceMeta, usage: Option<&Value>) {
    let Some(usage) = usage.filter(|usage| usage.is_object()) else {
        return;
    };
    if let Some(input) = usage.get("input_tokens").and_then(Value::as_u64) {
        meta.input_tokens = Some(input);
    }
    if let Some(output) = usage.get("output_tokens").and_then(Value::as_u64) {
        meta.output_tokens = Some(output);
    }
    meta.total_tokens = match (meta.input_tokens, meta.output_tokens) {
        (Some(input), Some(output)) => Some(input.saturating_add(output)),
        _ => None,
    };
}

#[derive(Debug, Default)]
pub(super) struct AnthropicStreamParser {
    meta: InferenceMeta,
    finish_reason: Option<String>,
    finished: bool,
}

impl SseEventParser for AnthropicStreamParser {
    fn on_event(&mut self, event: &SseEvent) -> Result<Vec<StreamInferenceChunk>, ModelError> {
        let value: Value = serde_json::from_str(&event.data).map_err(|error| {
            ModelError::inference_failed(format!("Invalid Anthropic SSE event: {error}"))
                .with_metadata(json!({ "source": "anthropic", "event": event.data }))
        })?;
        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .or(event.event.as_deref())
            .unwrap_or_default();

        let mut chunks = Vec::new();
        match event_type {
            "message_start" => {
                update_usage(
                    &mut self.meta,
                    value.get("message").and_then(|message| message.get("usage")),
                );
            }
            "content_block_start" => {
                let index = block_index(&value);
                let Some(block) = value.get("content_block") else {
                    return Ok(chunks);
                };
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = non_empty_str(block.get("text")) {
                            chunks.push(StreamInferenceChunk::TextDelta { delta: text });
                        }
                    }
                    Some("tool_use") => chunks.push(StreamInferenceChunk::ToolCallDelta {
                        index,
                        id: non_empty_str(block.get("id")),
                        name: non_empty_str(block.get("name")),
                        arguments_delta: None,
                    }),
                    _ => {}
                }
            }
            "content_block_delta" => {
                let index = block_index(&value);
                let Some(delta) = value.get("delta") else {
                    return Ok(chunks);
                };
                match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => {
                        if let Some(text) = non_empty_str(delta.get("text")) {
                            chunks.push(StreamInferenceChunk::TextDelta { delta: text });
                        }
                    }
                    Some("input_json_delta") => {
                        if let Some(partial) = non_empty_str(delta.get("partial_json")) {
                            chunks.push(StreamInferenceChunk::ToolCallDelta {
                                index,
                                id: None,
                                name: None,
                                arguments_delta: Some(partial),
                            });
                        }
                    }
                    _ => {}
                }
            }
            "message_delta" => {
                if let Some(reason) = value
                    .get("delta")
                    .and_then(|delta| delta.get("stop_reason"))
                    .and_then(Value::as_str)
                {
                    self.finish_reason = Some(reason.to_string());
                }
                update_usage(&mut self.meta, value.get("usage"));
            }
            "message_stop" => {
                self.finished = true;
                chunks.push(StreamInferenceChunk::Finished {
                    finish_reason: self.finish_reason.take(),
                    meta: std::mem::take(&mut self.meta),
                });
            }
            "error" => return Err(map_stream_error(value.get("error"))),
            "ping" | "content_block_stop" => {}
            other => debug!("ignoring Anthropic stream event `{other}`"),
        }
        Ok(chunks)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

fn map_stream_error(error: Option<&Value>) -> ModelError {
    let error_type = error
        .and_then(|error| error.get("type"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if error_type == "rate_limit_error" {
        return ModelError::rate_limit_exceeded(ModelProvider::Anthropic);
    }
    let message = error
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unknown stream error");
    ModelError::inference_failed(message)
        .with_metadata(json!({ "source": "anthropic", "errorType": error_type }))
}

fn block_index(value: &Value) -> usize {
    value.get("index").and_then(Value::as_u64).unwrap_or(0) as usize
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
