//! Provider-neutral conversation types.
//!
//! The serde representation of [`ContentBlock`] and [`Message`] matches the
//! Anthropic Messages API wire format, so those types are sent as-is by the
//! Anthropic provider and translated by the others.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A typed piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },

    /// The model asking for a tool to be run.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },

    /// The output of a tool, correlated by the originating request id.
    ToolResult { tool_use_id: String, content: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
        }
    }

    /// Get the text if this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A user message holding a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// A user message carrying tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }

    /// An assistant message with the given blocks.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }
}

/// Schema describing a tool to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// How the model may choose among the offered tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    /// Parse an Anthropic-style stop reason.
    pub fn parse(reason: &str) -> Self {
        match reason {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// A single call to the generative model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolSchema>>,
    pub tool_choice: Option<ToolChoice>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// What the model returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
}

impl ModelResponse {
    /// A plain text answer.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            stop_reason: StopReason::EndTurn,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Text of the first text block, or an empty string.
    pub fn first_text(&self) -> String {
        self.content
            .iter()
            .find_map(ContentBlock::as_text)
            .unwrap_or_default()
            .to_string()
    }

    /// All tool-use blocks in emission order.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_block_wire_format() {
        let block = ContentBlock::tool_use("toolu_1", "search_course_content", json!({"query": "MCP"}));
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({
                "type": "tool_use",
                "id": "toolu_1",
                "name": "search_course_content",
                "input": {"query": "MCP"}
            })
        );

        let result = ContentBlock::tool_result("toolu_1", "Tool output here");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "Tool output here"})
        );
    }

    #[test]
    fn test_tool_choice_serializes_as_auto() {
        assert_eq!(serde_json::to_value(ToolChoice::Auto).unwrap(), json!({"type": "auto"}));
    }

    #[test]
    fn test_first_text_skips_tool_blocks() {
        let response = ModelResponse {
            stop_reason: StopReason::ToolUse,
            content: vec![
                ContentBlock::tool_use("t1", "x", json!({})),
                ContentBlock::text("I'll search for that."),
            ],
        };
        assert_eq!(response.first_text(), "I'll search for that.");

        let empty = ModelResponse {
            stop_reason: StopReason::ToolUse,
            content: vec![ContentBlock::tool_use("t1", "x", json!({}))],
        };
        assert_eq!(empty.first_text(), "");
    }

    #[test]
    fn test_stop_reason_parse() {
        assert_eq!(StopReason::parse("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::parse("end_turn"), StopReason::EndTurn);
        assert_eq!(StopReason::parse("refusal"), StopReason::Other("refusal".to_string()));
    }
}
