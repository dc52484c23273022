use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;
use crate::message::{AssistantContent, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Mistral,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl ModelProvider {
    pub const ALL: [ModelProvider; 3] = [Self::Mistral, Self::OpenAi, Self::Anthropic];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mistral => "mistral",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl Display for ModelProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProvider {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == normalized)
            .ok_or_else(|| ModelError::provider_not_supported(value.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub provider: ModelProvider,
}

impl Model {
    pub fn new(name: impl Into<String>, provider: ModelProvider) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "canStream")]
    pub can_stream: bool,
    #[serde(rename = "isReasoning")]
    pub is_reasoning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelWithConfig {
    pub model: Model,
    pub config: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    Required,
    #[serde(rename = "named")]
    Named(String),
}

impl FromStr for ToolChoice {
    type Err = ModelError;

    /// `auto`, `required`, or any other non-empty value as a tool name.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" => Err(ModelError::inference_input_invalid(
                "tool choice must not be empty",
            )),
            "auto" => Ok(Self::Auto),
            "required" => Ok(Self::Required),
            name => Ok(Self::Named(name.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceInput {
    pub model: Model,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub tool_choice: Option<ToolChoice>,
    /// Overall deadline for the call including retries.
    pub timeout: Option<Duration>,
}

impl InferenceInput {
    pub fn new(model: Model, messages: Vec<Message>) -> Self {
        Self {
            model,
            messages,
            tools: Vec::new(),
            tool_choice: None,
            timeout: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceMeta {
    #[serde(rename = "inputTokens")]
    pub input_tokens: Option<u64>,
    #[serde(rename = "outputTokens")]
    pub output_tokens: Option<u64>,
    #[serde(rename = "totalTokens")]
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub content: Vec<AssistantContent>,
    pub meta: InferenceMeta,
}

impl InferenceResponse {
    /// Text parts joined in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                AssistantContent::ToolUse(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamInferenceChunk {
    TextDelta {
        delta: String,
    },
    ToolCallDelta {
        index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(rename = "argumentsDelta", skip_serializing_if = "Option::is_none")]
        arguments_delta: Option<String>,
    },
    Finished {
        #[serde(rename = "finishReason", skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
        meta: InferenceMeta,
    },
}
