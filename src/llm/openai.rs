//! OpenAI chat completions backend.

use super::types::{ContentBlock, ModelRequest, ModelResponse, Role, StopReason, ToolChoice};
use super::ChatModel;
use crate::error::{LektorError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FinishReason, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

/// Chat model served by the OpenAI API.
pub struct OpenAIModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAIModel {
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
        }
    }
}

fn build_err(e: impl std::fmt::Display) -> LektorError {
    LektorError::Model(e.to_string())
}

/// Translate the neutral history into chat completion messages.
///
/// Each tool result becomes its own `tool` message, in the order the results
/// were appended.
pub(crate) fn to_openai_messages(request: &ModelRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system.clone())
            .build()
            .map_err(build_err)?
            .into(),
    ];

    for message in &request.messages {
        match message.role {
            Role::User => {
                let mut text = Vec::new();
                for block in &message.content {
                    match block {
                        ContentBlock::Text { text: t } => text.push(t.as_str()),
                        ContentBlock::ToolResult { tool_use_id, content } => {
                            messages.push(
                                ChatCompletionRequestToolMessageArgs::default()
                                    .tool_call_id(tool_use_id.clone())
                                    .content(content.clone())
                                    .build()
                                    .map_err(build_err)?
                                    .into(),
                            );
                        }
                        ContentBlock::ToolUse { .. } => {}
                    }
                }
                if !text.is_empty() {
                    messages.push(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(text.join("\n"))
                            .build()
                            .map_err(build_err)?
                            .into(),
                    );
                }
            }
            Role::Assistant => {
                let mut text = Vec::new();
                let mut tool_calls = Vec::new();
                for block in &message.content {
                    match block {
                        ContentBlock::Text { text: t } => text.push(t.as_str()),
                        ContentBlock::ToolUse { id, name, input } => {
                            tool_calls.push(ChatCompletionMessageToolCall {
                                id: id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: name.clone(),
                                    arguments: input.to_string(),
                                },
                            });
                        }
                        ContentBlock::ToolResult { .. } => {}
                    }
                }

                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if !text.is_empty() {
                    args.content(text.join("\n"));
                }
                if !tool_calls.is_empty() {
                    args.tool_calls(tool_calls);
                }
                messages.push(args.build().map_err(build_err)?.into());
            }
        }
    }

    Ok(messages)
}

fn map_finish_reason(reason: Option<FinishReason>) -> StopReason {
    match reason {
        Some(FinishReason::ToolCalls) => StopReason::ToolUse,
        Some(FinishReason::Length) => StopReason::MaxTokens,
        Some(FinishReason::Stop) | None => StopReason::EndTurn,
        Some(other) => StopReason::Other(format!("{:?}", other)),
    }
}

#[async_trait]
impl ChatModel for OpenAIModel {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(to_openai_messages(request)?)
            .temperature(request.temperature)
            .max_completion_tokens(request.max_tokens);

        if let Some(tools) = &request.tools {
            let tools: Vec<ChatCompletionTool> = tools
                .iter()
                .map(|schema| ChatCompletionTool {
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionObject {
                        name: schema.name.clone(),
                        description: Some(schema.description.clone()),
                        parameters: Some(schema.input_schema.clone()),
                        strict: None,
                    },
                })
                .collect();
            args.tools(tools);
        }
        if let Some(ToolChoice::Auto) = request.tool_choice {
            args.tool_choice(ChatCompletionToolChoiceOption::Auto);
        }

        let completion = self
            .client
            .chat()
            .create(args.build().map_err(build_err)?)
            .await
            .map_err(|e| LektorError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LektorError::Model("No response from model".to_string()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::text(text));
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            let input = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            content.push(ContentBlock::tool_use(call.id, call.function.name, input));
        }

        let stop_reason = map_finish_reason(choice.finish_reason);
        debug!("OpenAI stop reason: {:?}", stop_reason);

        Ok(ModelResponse { stop_reason, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Message;
    use serde_json::json;

    #[test]
    fn test_tool_results_become_tool_messages() {
        let request = ModelRequest {
            system: "policy".to_string(),
            messages: vec![
                Message::user("What is MCP?"),
                Message::assistant(vec![
                    ContentBlock::text("Let me search."),
                    ContentBlock::tool_use("call_1", "search_course_content", json!({"query": "MCP"})),
                    ContentBlock::tool_use("call_2", "get_course_outline", json!({"course_title": "MCP"})),
                ]),
                Message::tool_results(vec![
                    ContentBlock::tool_result("call_1", "first"),
                    ContentBlock::tool_result("call_2", "second"),
                ]),
            ],
            tools: None,
            tool_choice: None,
            temperature: 0.0,
            max_tokens: 800,
        };

        let messages = to_openai_messages(&request).unwrap();
        let json: Vec<Value> = messages
            .iter()
            .map(|m| serde_json::to_value(m).unwrap())
            .collect();

        let roles: Vec<&str> = json.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool", "tool"]);

        assert_eq!(json[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(json[2]["tool_calls"][1]["function"]["name"], "get_course_outline");
        assert_eq!(json[3]["tool_call_id"], "call_1");
        assert_eq!(json[4]["tool_call_id"], "call_2");
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(map_finish_reason(Some(FinishReason::ToolCalls)), StopReason::ToolUse);
        assert_eq!(map_finish_reason(Some(FinishReason::Stop)), StopReason::EndTurn);
        assert_eq!(map_finish_reason(Some(FinishReason::Length)), StopReason::MaxTokens);
        assert_eq!(map_finish_reason(None), StopReason::EndTurn);
        // Legacy function_call replies carry no tool_calls to run.
        assert_eq!(
            map_finish_reason(Some(FinishReason::FunctionCall)),
            StopReason::Other("FunctionCall".to_string())
        );
    }
}
