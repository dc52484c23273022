use serde_json::{json, Map, Value};

use crate::error::ModelError;
use crate::message::{
    needs_awaiting_user_input, AssistantContent, Message, AWAITING_USER_INPUT,
};
use crate::types::{
    InferenceInput, InferenceMeta, InferenceResponse, ModelProvider, Tool, ToolChoice,
};

/// Mistral and OpenAI share the chat-completions schema but differ in how
/// user content and tool-call arguments are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChatDialect {
    Mistral,
    OpenAi,
}

impl ChatDialect {
    pub(super) fn provider(self) -> ModelProvider {
        match self {
            Self::Mistral => ModelProvider::Mistral,
            Self::OpenAi => ModelProvider::OpenAi,
        }
    }
}

pub(super) fn build_chat_payload(
    dialect: ChatDialect,
    input: &InferenceInput,
    max_tokens: Option<u32>,
) -> Value {
    let mut payload = json!({
        "model": input.model.name,
        "messages": convert_messages(dialect, &input.messages),
    });
    if !input.tools.is_empty() {
        payload["tools"] = convert_tools(&input.tools);
    }
    if let Some(tool_choice) = &input.tool_choice {
        payload["tool_choice"] = convert_tool_choice(tool_choice);
    }
    if let Some(max_tokens) = max_tokens {
        let key = match dialect {
            ChatDialect::Mistral => "max_tokens",
            ChatDialect::OpenAi => "max_completion_tokens",
        };
        payload[key] = json!(max_tokens);
    }
    payload
}

pub(super) fn convert_messages(dialect: ChatDialect, messages: &[Message]) -> Vec<Value> {
    let mut converted = Vec::new();
    for message in messages {
        match message {
            Message::User { content } => {
                for part in content {
                    let content = match dialect {
                        ChatDialect::Mistral => json!([{ "type": "text", "text": part.text }]),
                        ChatDialect::OpenAi => Value::String(part.text.clone()),
                    };
                    converted.push(json!({ "role": "user", "content": content }));
                }
            }
            Message::Assistant { content } if content.is_empty() => {}
            Message::Assistant { content } => {
                converted.push(convert_assistant_message(dialect, content));
            }
            Message::System { content } => {
                for part in content {
                    converted.push(json!({ "role": "system", "content": part.text }));
                }
            }
            Message::ToolResult { content } => {
                for part in content {
                    converted.push(json!({
                        "role": "tool",
                        "tool_call_id": part.tool_id,
                        "content": part.result,
                    }));
                }
                if needs_awaiting_user_input(content) {
                    converted.push(json!({
                        "role": "assistant",
                        "content": AWAITING_USER_INPUT,
                    }));
                }
            }
        }
    }
    converted
}

fn convert_assistant_message(dialect: ChatDialect, content: &[AssistantContent]) -> Value {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for part in content {
        match part {
            AssistantContent::Text(text) => text_parts.push(text.text.as_str()),
            AssistantContent::ToolUse(tool_use) => {
                let params = Value::Object(tool_use.params.clone());
                let arguments = match dialect {
                    ChatDialect::Mistral => params,
                    ChatDialect::OpenAi => Value::String(params.to_string()),
                };
                tool_calls.push(json!({
                    "id": tool_use.id,
                    "type": "function",
                    "function": {
                        "name": tool_use.name,
                        "arguments": arguments,
                    },
                }));
            }
        }
    }

    // Every text part is kept, joined by newlines, rather than only the last one.
    let text = if text_parts.is_empty() {
        Value::Null
    } else {
        Value::String(text_parts.join("\n"))
    };
    let mut message = json!({ "role": "assistant", "content": text });
    if !tool_calls.is_empty() {
        message["tool_calls"] = Value::Array(tool_calls);
    }
    message
}

pub(super) fn convert_tools(tools: &[Tool]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect(),
    )
}

pub(super) fn convert_tool_choice(tool_choice: &ToolChoice) -> Value {
    match tool_choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Named(name) => json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}

pub(super) fn parse_chat_completion(
    provider: ModelProvider,
    body: &Value,
) -> Result<InferenceResponse, ModelError> {
    let Some(completion) = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .filter(|message| message.is_object())
    else {
        return Err(
            ModelError::inference_failed("No completion returned from model")
                .with_metadata(json!({ "source": provider.as_str() })),
        );
    };

    let mut content = Vec::new();
    match completion.get("content") {
        Some(Value::String(text)) if !text.is_empty() => {
            content.push(AssistantContent::text(text.clone()));
        }
        Some(Value::Array(parts)) => {
            for part in parts {
                if part.get("type").and_then(Value::as_str) != Some("text") {
                    continue;
                }
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    content.push(AssistantContent::text(text));
                }
            }
        }
        _ => {}
    }

    if let Some(tool_calls) = completion.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls {
            let id = tool_call
                .get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .unwrap_or("none");
            let function = tool_call.get("function");
            let name = function
                .and_then(|function| function.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let params = normalize_tool_arguments(
                name,
                function.and_then(|function| function.get("arguments")),
            )?;
            content.push(AssistantContent::tool_use(id, name, params));
        }
    }

    Ok(InferenceResponse {
        content,
        meta: parse_usage(body.get("usage")),
    })
}

/// Tool-call arguments arrive either as a JSON object or as a string that
/// holds one. Anything that is not an object is rejected.
pub(super) fn normalize_tool_arguments(
    tool_name: &str,
    arguments: Option<&Value>,
) -> Result<Map<String, Value>, ModelError> {
    let parsed = match arguments {
        None | Some(Value::Null) => return Ok(Map::new()),
        Some(Value::String(raw)) if raw.trim().is_empty() => return Ok(Map::new()),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).map_err(|error| {
            ModelError::inference_input_invalid(format!(
                "arguments for tool '{tool_name}' are not valid JSON: {error}"
            ))
            .with_metadata(json!({ "toolName": tool_name, "arguments": raw }))
        })?,
        Some(other) => other.clone(),
    };

    match parsed {
        Value::Object(params) => Ok(params),
        other => Err(ModelError::inference_input_invalid(format!(
            "arguments for tool '{tool_name}' must be a JSON object"
        ))
        .with_metadata(json!({ "toolName": tool_name, "arguments": other }))),
    }
}

pub(super) fn parse_usage(usage: Option<&Value>) -> InferenceMeta {
    let field = |name: &str| usage.and_then(|usage| usage.get(name)).and_then(Value::as_u64);
    InferenceMeta {
        input_tokens: field("prompt_tokens"),
        output_tokens: field("completion_tokens"),
        total_tokens: field("total_tokens"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelErrorCode;
    use crate::message::{TextContent, ToolResultContent, TOOL_DISPLAYED_ACKNOWLEDGEMENT};
    use crate::types::Model;

    fn city_params() -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("city".to_string(), json!("Berlin"));
        params
    }

    #[test]
    fn user_content_shape_depends_on_dialect() {
        let messages = vec![Message::User {
            content: vec![TextContent::new("first"), TextContent::new("second")],
        }];

        let mistral = convert_messages(ChatDialect::Mistral, &messages);
        assert_eq!(mistral.len(), 2);
        assert_eq!(mistral[0]["content"], json!([{ "type": "text", "text": "first" }]));

        let openai = convert_messages(ChatDialect::OpenAi, &messages);
        assert_eq!(openai[1], json!({ "role": "user", "content": "second" }));
    }

    #[test]
    fn assistant_message_merges_text_and_keeps_tool_call_order() {
        let messages = vec![Message::assistant(vec![
            AssistantContent::text("Let me check."),
            AssistantContent::tool_use("call_1", "get_weather", city_params()),
            AssistantContent::text("One moment."),
            AssistantContent::tool_use("call_2", "get_time", Map::new()),
        ])];

        let openai = convert_messages(ChatDialect::OpenAi, &messages);
        assert_eq!(openai.len(), 1);
        assert_eq!(openai[0]["content"], "Let me check.\nOne moment.");
        assert_eq!(openai[0]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            openai[0]["tool_calls"][0]["function"]["arguments"],
            "{\"city\":\"Berlin\"}"
        );
        assert_eq!(openai[0]["tool_calls"][1]["function"]["name"], "get_time");

        let mistral = convert_messages(ChatDialect::Mistral, &messages);
        assert_eq!(
            mistral[0]["tool_calls"][0]["function"]["arguments"],
            json!({ "city": "Berlin" })
        );
    }

    #[test]
    fn tool_only_assistant_message_has_null_content() {
        let messages = vec![Message::assistant(vec![AssistantContent::tool_use(
            "call_1",
            "get_weather",
            city_params(),
        )])];
        let converted = convert_messages(ChatDialect::OpenAi, &messages);
        assert_eq!(converted[0]["content"], Value::Null);
    }

    #[test]
    fn empty_assistant_turn_is_not_sent() {
        let messages = vec![
            Message::user("hi"),
            Message::Assistant {
                content: Vec::new(),
            },
            Message::user("still there?"),
        ];
        for dialect in [ChatDialect::Mistral, ChatDialect::OpenAi] {
            let converted = convert_messages(dialect, &messages);
            assert_eq!(converted.len(), 2, "{dialect:?}");
            assert!(converted.iter().all(|message| message["role"] == "user"));
        }
    }

    fn text_round_trip(dialect: ChatDialect, parts: &[&str]) -> Vec<AssistantContent> {
        let message = Message::assistant(
            parts.iter().map(|part| AssistantContent::text(*part)).collect(),
        );
        let wire = convert_messages(dialect, &[message]);
        let body = json!({ "choices": [{ "message": wire[0] }] });
        parse_chat_completion(dialect.provider(), &body)
            .expect("parse")
            .content
    }

    #[test]
    fn assistant_text_survives_wire_round_trip() {
        for dialect in [ChatDialect::Mistral, ChatDialect::OpenAi] {
            assert_eq!(
                text_round_trip(dialect, &["4"]),
                vec![AssistantContent::text("4")]
            );
            assert_eq!(
                text_round_trip(dialect, &["Grüße aus Köln 👋", "東京"]),
                vec![AssistantContent::text("Grüße aus Köln 👋\n東京")]
            );
            assert_eq!(
                text_round_trip(dialect, &["a", "b"]),
                vec![AssistantContent::text("a\nb")]
            );
            assert_eq!(text_round_trip(dialect, &[""]), Vec::new());
        }
    }

    #[test]
    fn acknowledged_tool_results_append_awaiting_marker() {
        let messages = vec![Message::ToolResult {
            content: vec![
                ToolResultContent {
                    tool_id: "call_1".to_string(),
                    result: TOOL_DISPLAYED_ACKNOWLEDGEMENT.to_string(),
                },
                ToolResultContent {
                    tool_id: "call_2".to_string(),
                    result: TOOL_DISPLAYED_ACKNOWLEDGEMENT.to_string(),
                },
            ],
        }];

        let converted = convert_messages(ChatDialect::Mistral, &messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0]["tool_call_id"], "call_1");
        assert_eq!(converted[1]["tool_call_id"], "call_2");
        assert_eq!(
            converted[2],
            json!({ "role": "assistant", "content": "Awaiting user input" })
        );
    }

    #[test]
    fn real_tool_results_do_not_append_marker() {
        let messages = vec![Message::ToolResult {
            content: vec![
                ToolResultContent {
                    tool_id: "call_1".to_string(),
                    result: TOOL_DISPLAYED_ACKNOWLEDGEMENT.to_string(),
                },
                ToolResultContent {
                    tool_id: "call_2".to_string(),
                    result: "18 degrees".to_string(),
                },
            ],
        }];
        let converted = convert_messages(ChatDialect::OpenAi, &messages);
        assert_eq!(converted.len(), 2);
    }

    #[test]
    fn payload_includes_tools_choice_and_max_tokens() {
        let input = InferenceInput::new(
            Model::new("mistral-large-latest", ModelProvider::Mistral),
            vec![Message::system("be brief"), Message::user("weather in Berlin?")],
        )
        .with_tools(vec![Tool {
            name: "get_weather".to_string(),
            description: "Weather".to_string(),
            parameters: json!({ "type": "object" }),
        }])
        .with_tool_choice(ToolChoice::Named("get_weather".to_string()));

        let payload = build_chat_payload(ChatDialect::Mistral, &input, Some(1000));
        assert_eq!(payload["model"], "mistral-large-latest");
        assert_eq!(payload["max_tokens"], 1000);
        assert_eq!(payload["messages"][0], json!({ "role": "system", "content": "be brief" }));
        assert_eq!(payload["tools"][0]["type"], "function");
        assert_eq!(payload["tools"][0]["function"]["parameters"], json!({ "type": "object" }));
        assert_eq!(
            payload["tool_choice"],
            json!({ "type": "function", "function": { "name": "get_weather" } })
        );
    }

    #[test]
    fn parse_reads_text_tool_calls_and_usage() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        { "id": "c1", "function": { "name": "get_weather", "arguments": "{\"city\":\"Berlin\"}" } },
                        { "function": { "name": "get_weather", "arguments": { "city": "Berlin" } } }
                    ]
                }
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17 }
        });

        let response = parse_chat_completion(ModelProvider::Mistral, &body).expect("parse");
        assert_eq!(
            response.content,
            vec![
                AssistantContent::tool_use("c1", "get_weather", city_params()),
                AssistantContent::tool_use("none", "get_weather", city_params()),
            ]
        );
        assert_eq!(
            response.meta,
            InferenceMeta {
                input_tokens: Some(12),
                output_tokens: Some(5),
                total_tokens: Some(17),
            }
        );
    }

    #[test]
    fn parse_accepts_text_part_arrays() {
        let body = json!({
            "choices": [{ "message": { "content": [
                { "type": "text", "text": "Hello" },
                { "type": "reference", "reference_ids": [1] },
                { "type": "text", "text": "world" }
            ] } }]
        });
        let response = parse_chat_completion(ModelProvider::Mistral, &body).expect("parse");
        assert_eq!(
            response.content,
            vec![AssistantContent::text("Hello"), AssistantContent::text("world")]
        );
        assert_eq!(response.meta, InferenceMeta::default());
    }

    #[test]
    fn parse_rejects_missing_completion() {
        let error = parse_chat_completion(ModelProvider::Mistral, &json!({ "choices": [] }))
            .expect_err("no completion");
        assert_eq!(error.code, ModelErrorCode::InferenceFailed);
        assert_eq!(error.message, "Inference failed: No completion returned from model");
        assert_eq!(error.metadata, Some(json!({ "source": "mistral" })));
    }

    #[test]
    fn malformed_arguments_are_input_errors() {
        let error = normalize_tool_arguments("get_weather", Some(&json!("{\"city\":")))
            .expect_err("truncated json");
        assert_eq!(error.code, ModelErrorCode::InferenceInputInvalid);

        let error = normalize_tool_arguments("get_weather", Some(&json!("[1,2]")))
            .expect_err("array arguments");
        assert_eq!(error.code, ModelErrorCode::InferenceInputInvalid);

        assert_eq!(
            normalize_tool_arguments("get_time", Some(&json!(""))).expect("empty"),
            Map::new()
        );
    }
}
