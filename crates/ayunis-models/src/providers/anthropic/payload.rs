use serde_json::{json, Value};

use crate::message::{
    needs_awaiting_user_input, AssistantContent, Message, AWAITING_USER_INPUT,
};
use crate::types::{InferenceInput, Tool, ToolChoice};

pub(super) fn build_anthropic_payload(
    input: &InferenceInput,
    max_tokens: u32,
    stream: bool,
) -> Value {
    let mut payload = json!({
        "model": input.model.name,
        "max_tokens": max_tokens,
        "messages": convert_messages(&input.messages),
    });

    let system = convert_system(&input.messages);
    if !system.is_empty() {
        payload["system"] = Value::Array(system);
    }
    if !input.tools.is_empty() {
        payload["tools"] = convert_tools(&input.tools);
    }
    if let Some(tool_choice) = &input.tool_choice {
        payload["tool_choice"] = convert_tool_choice(tool_choice);
    }
    if stream {
        payload["stream"] = Value::Bool(true);
    }
    payload
}

/// System text lives in the top-level `system` field, one block per part.
fn convert_system(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .filter_map(|message| match message {
            Message::System { content } => Some(content),
            _ => None,
        })
        .flatten()
        .map(|part| json!({ "type": "text", "text": part.text }))
        .collect()
}

fn convert_messages(messages: &[Message]) -> Vec<Value> {
    let mut converted = Vec::new();

    for message in messages {
        match message {
            Message::User { content } => {
                for part in content {
                    converted.push(json!({
                        "role": "user",
                        "content": [{ "type": "text", "text": part.text }],
                    }));
                }
            }
            Message::Assistant { content } => {
                let blocks = content
                    .iter()
                    .map(|part| match part {
                        AssistantContent::Text(text) => json!({
                            "type": "text",
                            "text": text.text,
                        }),
                        AssistantContent::ToolUse(tool_use) => json!({
                            "type": "tool_use",
                            "id": tool_use.id,
                            "name": tool_use.name,
                            "input": tool_use.params,
                        }),
                    })
                    .collect::<Vec<_>>();
                if !blocks.is_empty() {
                    converted.push(json!({ "role": "assistant", "content": blocks }));
                }
            }
            Message::System { .. } => {}
            Message::ToolResult { content } => {
                let blocks = content
                    .iter()
                    .map(|part| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": part.tool_id,
                            "content": part.result,
                        })
                    })
                    .collect::<Vec<_>>();
                converted.push(json!({ "role": "user", "content": blocks }));
                if needs_awaiting_user_input(content) {
                    converted.push(json!({
                        "role": "assistant",
                        "content": [{ "type": "text", "text": AWAITING_USER_INPUT }],
                    }));
                }
            }
        }
    }

    converted
}

fn convert_tools(tools: &[Tool]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect(),
    )
}

fn convert_tool_choice(tool_choice: &ToolChoice) -> Value {
    match tool_choice {
        ToolChoice::Auto => json!({ "type": "auto" }),
        ToolChoice::Required => json!({ "type": "any" }),
        ToolChoice::Named(name) => json!({ "type": "tool", "name": name }),
    }
}
