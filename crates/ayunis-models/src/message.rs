use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result text a client reports after rendering a display-only tool.
pub const TOOL_DISPLAYED_ACKNOWLEDGEMENT: &str = "Tool has been displayed successfully";
/// Assistant turn inserted after acknowledgement-only tool results so the
/// conversation does not end on a tool message.
pub const AWAITING_USER_INPUT: &str = "Awaiting user input";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseContent {
    pub id: String,
    pub name: String,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultContent {
    #[serde(rename = "toolId")]
    pub tool_id: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantContent {
    #[serde(rename = "text")]
    Text(TextContent),
    #[serde(rename = "tool_use")]
    ToolUse(ToolUseContent),
}

impl AssistantContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextContent::new(text))
    }

    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        params: Map<String, Value>,
    ) -> Self {
        Self::ToolUse(ToolUseContent {
            id: id.into(),
            name: name.into(),
            params,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "user")]
    User { content: Vec<TextContent> },
    #[serde(rename = "assistant")]
    Assistant { content: Vec<AssistantContent> },
    #[serde(rename = "system")]
    System { content: Vec<TextContent> },
    #[serde(rename = "tool")]
    ToolResult { content: Vec<ToolResultContent> },
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: vec![TextContent::new(text)],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::System {
            content: vec![TextContent::new(text)],
        }
    }

    pub fn assistant(content: Vec<AssistantContent>) -> Self {
        Self::Assistant { content }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![AssistantContent::text(text)],
        }
    }

    pub fn tool_result(tool_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self::ToolResult {
            content: vec![ToolResultContent {
                tool_id: tool_id.into(),
                result: result.into(),
            }],
        }
    }

    pub fn role(&self) -> MessageRole {
        match self {
            Self::User { .. } => MessageRole::User,
            Self::Assistant { .. } => MessageRole::Assistant,
            Self::System { .. } => MessageRole::System,
            Self::ToolResult { .. } => MessageRole::Tool,
        }
    }

    /// Number of content parts, whatever their kind.
    pub fn content_len(&self) -> usize {
        match self {
            Self::User { content } | Self::System { content } => content.len(),
            Self::Assistant { content } => content.len(),
            Self::ToolResult { content } => content.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content_len() == 0
    }
}

/// True when every result in `content` is the display acknowledgement.
/// Adapters follow such a tool message with an [`AWAITING_USER_INPUT`] turn.
pub fn needs_awaiting_user_input(content: &[ToolResultContent]) -> bool {
    !content.is_empty()
        && content
            .iter()
            .all(|part| part.result == TOOL_DISPLAYED_ACKNOWLEDGEMENT)
}
