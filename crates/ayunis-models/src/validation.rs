use std::collections::HashSet;

use jsonschema::JSONSchema;
use serde_json::{json, Value};

use crate::error::ModelError;
use crate::message::ToolUseContent;
use crate::types::{InferenceInput, Tool, ToolChoice};

/// Checks an input before any vendor call is made.
pub fn validate_inference_input(input: &InferenceInput) -> Result<(), ModelError> {
    if input.messages.is_empty() {
        return Err(ModelError::inference_input_invalid(
            "at least one message is required",
        ));
    }

    for (index, message) in input.messages.iter().enumerate() {
        if message.is_empty() {
            return Err(ModelError::inference_input_invalid(format!(
                "{:?} message at index {index} has no content",
                message.role()
            ))
            .with_metadata(json!({ "messageIndex": index })));
        }
    }

    let mut seen = HashSet::new();
    for tool in &input.tools {
        if !seen.insert(tool.name.as_str()) {
            return Err(ModelError::inference_input_invalid(format!(
                "duplicate tool '{}'",
                tool.name
            )));
        }
        compile_tool_schema(tool)?;
    }

    match &input.tool_choice {
        Some(ToolChoice::Required) if input.tools.is_empty() => Err(
            ModelError::inference_input_invalid("tool choice 'required' needs at least one tool"),
        ),
        Some(ToolChoice::Named(name)) if !input.tools.iter().any(|tool| &tool.name == name) => {
            Err(ModelError::inference_input_invalid(format!(
                "tool choice names unknown tool '{name}'"
            ))
            .with_metadata(json!({
                "toolName": name,
                "availableTools": input.tools.iter().map(|tool| tool.name.clone()).collect::<Vec<_>>(),
            })))
        }
        _ => Ok(()),
    }
}

/// Validates the params of a returned tool call against its declared schema.
pub fn validate_tool_use(tools: &[Tool], tool_use: &ToolUseContent) -> Result<(), ModelError> {
    let Some(tool) = tools.iter().find(|tool| tool.name == tool_use.name) else {
        return Err(ModelError::inference_input_invalid(format!(
            "tool '{}' not found",
            tool_use.name
        ))
        .with_metadata(json!({
            "toolName": tool_use.name,
            "availableTools": tools.iter().map(|tool| tool.name.clone()).collect::<Vec<_>>(),
        })));
    };

    let compiled = compile_tool_schema(tool)?;
    let params = Value::Object(tool_use.params.clone());
    if let Err(errors) = compiled.validate(&params) {
        let validation_errors = errors
            .map(|error| {
                json!({
                    "path": error.instance_path.to_string(),
                    "message": error.to_string(),
                })
            })
            .collect::<Vec<_>>();

        return Err(ModelError::inference_input_invalid(format!(
            "params for tool '{}' do not match its schema",
            tool.name
        ))
        .with_metadata(json!({
            "toolName": tool.name,
            "toolId": tool_use.id,
            "validationErrors": validation_errors,
        })));
    }

    Ok(())
}

fn compile_tool_schema(tool: &Tool) -> Result<JSONSchema, ModelError> {
    JSONSchema::compile(&tool.parameters).map_err(|error| {
        ModelError::inference_input_invalid(format!(
            "invalid JSON schema for tool '{}': {error}",
            tool.name
        ))
        .with_metadata(json!({ "toolName": tool.name }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelErrorCode;
    use crate::message::{AssistantContent, Message};
    use crate::types::{Model, ModelProvider};
    use serde_json::Map;

    fn weather_tool() -> Tool {
        Tool {
            name: "get_weather".to_string(),
            description: "Current weather for a city".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "city": { "type": "string" } },
                "required": ["city"]
            }),
        }
    }

    fn input(messages: Vec<Message>) -> InferenceInput {
        InferenceInput::new(Model::new("mistral-large-latest", ModelProvider::Mistral), messages)
    }

    #[test]
    fn rejects_empty_message_list() {
        let error = validate_inference_input(&input(Vec::new())).expect_err("should fail");
        assert_eq!(error.code, ModelErrorCode::InferenceInputInvalid);
    }

    #[test]
    fn rejects_messages_without_content() {
        let error = validate_inference_input(&input(vec![Message::User {
            content: Vec::new(),
        }]))
        .expect_err("empty user message should fail");
        assert_eq!(error.code, ModelErrorCode::InferenceInputInvalid);

        let error = validate_inference_input(&input(vec![
            Message::user("hi"),
            Message::Assistant {
                content: Vec::new(),
            },
        ]))
        .expect_err("empty assistant turn should fail");
        assert_eq!(error.code, ModelErrorCode::InferenceInputInvalid);
        assert_eq!(error.metadata, Some(json!({ "messageIndex": 1 })));

        let tool_only = validate_inference_input(&input(vec![
            Message::user("weather?"),
            Message::assistant(vec![AssistantContent::tool_use(
                "call_1",
                "get_weather",
                Map::new(),
            )]),
        ]));
        assert!(tool_only.is_ok(), "unexpected error: {tool_only:?}");
    }

    #[test]
    fn required_tool_choice_needs_tools() {
        let request = input(vec![Message::user("weather?")]).with_tool_choice(ToolChoice::Required);
        assert!(validate_inference_input(&request).is_err());

        let request = request.with_tools(vec![weather_tool()]);
        assert!(validate_inference_input(&request).is_ok());
    }

    #[test]
    fn named_tool_choice_must_reference_declared_tool() {
        let request = input(vec![Message::user("weather?")])
            .with_tools(vec![weather_tool()])
            .with_tool_choice(ToolChoice::Named("get_time".to_string()));
        let error = validate_inference_input(&request).expect_err("unknown tool");
        assert_eq!(error.metadata.as_ref().map(|m| &m["toolName"]), Some(&json!("get_time")));
    }

    #[test]
    fn rejects_uncompilable_schema_and_duplicate_names() {
        let broken = Tool {
            name: "broken".to_string(),
            description: String::new(),
            parameters: json!({ "type": 12 }),
        };
        let request = input(vec![Message::user("hi")]).with_tools(vec![broken]);
        assert!(validate_inference_input(&request).is_err());

        let request =
            input(vec![Message::user("hi")]).with_tools(vec![weather_tool(), weather_tool()]);
        assert!(validate_inference_input(&request).is_err());
    }

    #[test]
    fn validate_tool_use_checks_params_against_schema() {
        let tools = vec![weather_tool()];
        let mut params = Map::new();
        params.insert("city".to_string(), json!("Berlin"));
        let valid = ToolUseContent {
            id: "call_1".to_string(),
            name: "get_weather".to_string(),
            params,
        };
        assert!(validate_tool_use(&tools, &valid).is_ok());

        let invalid = ToolUseContent {
            params: Map::new(),
            ..valid.clone()
        };
        let error = validate_tool_use(&tools, &invalid).expect_err("missing city");
        assert_eq!(error.code, ModelErrorCode::InferenceInputInvalid);

        let unknown = ToolUseContent {
            name: "get_time".to_string(),
            ..valid
        };
        assert!(validate_tool_use(&tools, &unknown).is_err());
    }
}
