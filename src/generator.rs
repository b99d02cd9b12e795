//! Tool-augmented answer generation.
//!
//! [`Generator`] drives a [`ChatModel`] through a bounded number of tool
//! rounds. Each round the model may request any number of tools; their
//! results go back in a single user message and the model is asked again.
//! Once the round limit is hit the model gets one last call with the tools
//! still described but no tool choice offered.

use crate::config::{ModelSettings, Prompts};
use crate::error::Result;
use crate::llm::{
    ChatModel, ContentBlock, Message, ModelRequest, ModelResponse, StopReason, ToolChoice,
    ToolSchema,
};
use crate::tools::{Source, ToolManager};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Answers course questions, calling tools when the model asks for them.
pub struct Generator {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
    max_tool_rounds: usize,
    temperature: f32,
    max_tokens: u32,
}

impl Generator {
    /// Create a generator with the given policy text and default limits.
    pub fn new(model: Arc<dyn ChatModel>, system_prompt: &str) -> Self {
        Self {
            model,
            system_prompt: system_prompt.to_string(),
            max_tool_rounds: 2,
            temperature: 0.0,
            max_tokens: 800,
        }
    }

    /// Create a generator from the `[model]` settings and loaded prompts.
    pub fn from_settings(model: Arc<dyn ChatModel>, settings: &ModelSettings, prompts: &Prompts) -> Self {
        Self::new(model, &prompts.assistant.system)
            .with_max_tool_rounds(settings.max_tool_rounds)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens)
    }

    /// Set how many tool rounds may run before the final call.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn system_content(&self, history: Option<&str>) -> String {
        match history.filter(|h| !h.is_empty()) {
            Some(history) => format!("{}\n\nPrevious conversation:\n{}", self.system_prompt, history),
            None => self.system_prompt.clone(),
        }
    }

    fn request(
        &self,
        system: &str,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        tool_choice: Option<ToolChoice>,
    ) -> ModelRequest {
        ModelRequest {
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: tools.map(<[ToolSchema]>::to_vec),
            tool_choice,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Produce an answer for `query`.
    ///
    /// Tools are only offered when `tools` is non-empty, and only run when a
    /// `manager` is given. Model and tool failures are returned as errors.
    #[instrument(skip_all, fields(max_rounds = self.max_tool_rounds))]
    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&[ToolSchema]>,
        manager: Option<&ToolManager>,
    ) -> Result<Generation> {
        let tools = tools.filter(|t| !t.is_empty());
        let system = self.system_content(history);
        let mut messages = vec![Message::user(query)];
        let mut tracker = manager.map(ToolManager::source_tracker).unwrap_or_default();
        let mut tool_calls = Vec::new();
        let mut rounds = 0;

        while rounds < self.max_tool_rounds {
            let request = self.request(&system, &messages, tools, tools.map(|_| ToolChoice::Auto));
            let response = self.model.complete(&request).await?;

            let manager = match manager {
                Some(manager)
                    if tools.is_some()
                        && response.stop_reason == StopReason::ToolUse
                        && response.tool_uses().next().is_some() =>
                {
                    manager
                }
                _ => {
                    debug!("Model answered after {} tool rounds", rounds);
                    return Ok(Generation {
                        answer: response.first_text(),
                        sources: tracker.drain(),
                        rounds,
                        tool_calls,
                    });
                }
            };

            let results = run_tools(manager, &response, &mut tracker, &mut tool_calls).await?;
            messages.push(Message::assistant(response.content));
            messages.push(Message::tool_results(results));
            rounds += 1;
        }

        info!("Reached {} tool rounds, requesting final answer", rounds);
        let request = self.request(&system, &messages, tools, None);
        let response = self.model.complete(&request).await?;

        Ok(Generation {
            answer: response.first_text(),
            sources: tracker.drain(),
            rounds,
            tool_calls,
        })
    }
}

/// Run every tool the model asked for, in order, and collect the results.
async fn run_tools(
    manager: &ToolManager,
    response: &ModelResponse,
    tracker: &mut crate::tools::SourceTracker,
    records: &mut Vec<ToolCallRecord>,
) -> Result<Vec<ContentBlock>> {
    let mut results = Vec::new();

    for (id, name, input) in response.tool_uses() {
        info!("Model calling tool: {} with args: {}", name, input);
        let output = manager.dispatch(name, input).await?;
        tracker.record(name, &output);

        records.push(ToolCallRecord {
            name: name.to_string(),
            arguments: input.to_string(),
            result: output.text.clone(),
        });
        results.push(ContentBlock::tool_result(id, output.text));
    }

    Ok(results)
}

/// Result of one [`Generator::generate`] call.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    /// The final answer text.
    pub answer: String,
    /// Citations gathered while answering.
    pub sources: Vec<Source>,
    /// Tool rounds used.
    pub rounds: usize,
    /// Every tool call made, in order.
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Record of a tool call made while answering.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Text returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LektorError;
    use crate::llm::mock::ScriptedModel;
    use crate::llm::Role;
    use crate::tools::{Tool, ToolOutput};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    const POLICY: &str = "You answer course questions.";

    struct LookupTool {
        name: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl Tool for LookupTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema::new(self.name, "Lookup", json!({"type": "object", "properties": {}}))
        }

        async fn execute(&self, args: &Value) -> Result<ToolOutput> {
            if self.fail {
                return Err(LektorError::Index("index offline".to_string()));
            }
            let topic = args["topic"].as_str().unwrap_or_default();
            Ok(ToolOutput::with_sources(
                format!("{} result for {}", self.name, topic),
                vec![Source::new(format!("{} - Lesson 1", topic), None)],
            ))
        }
    }

    fn manager(fail: bool) -> ToolManager {
        let mut manager = ToolManager::new();
        manager
            .register(Arc::new(LookupTool { name: "search_course_content", fail }))
            .unwrap();
        manager
    }

    fn tool_use(calls: &[(&str, &str)]) -> ModelResponse {
        let mut content = vec![ContentBlock::text("Let me look.")];
        content.extend(calls.iter().map(|(id, topic)| {
            ContentBlock::tool_use(*id, "search_course_content", json!({"topic": topic}))
        }));
        ModelResponse {
            stop_reason: StopReason::ToolUse,
            content,
        }
    }

    #[tokio::test]
    async fn test_no_schemas_single_call() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelResponse {
                stop_reason: StopReason::ToolUse,
                content: vec![ContentBlock::text("Direct answer")],
            },
            ModelResponse::text("never used"),
        ]));
        let generator = Generator::new(model.clone(), POLICY);
        let manager = manager(false);

        let generation = generator
            .generate("What is MCP?", None, None, Some(&manager))
            .await
            .unwrap();

        assert_eq!(generation.answer, "Direct answer");
        assert_eq!(model.call_count(), 1);

        let request = &model.requests()[0];
        assert_eq!(request.system, POLICY);
        assert!(request.tools.is_none());
        assert!(request.tool_choice.is_none());
        assert_eq!(request.messages, vec![Message::user("What is MCP?")]);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 800);
    }

    #[tokio::test]
    async fn test_tool_use_without_manager_returns_text() {
        let model = Arc::new(ScriptedModel::new(vec![tool_use(&[("t1", "MCP")])]));
        let generator = Generator::new(model.clone(), POLICY);
        let schemas = manager(false).schemas();

        let generation = generator
            .generate("q", None, Some(&schemas), None)
            .await
            .unwrap();

        assert_eq!(generation.answer, "Let me look.");
        assert_eq!(generation.rounds, 0);
        assert_eq!(model.call_count(), 1);
        assert_eq!(model.requests()[0].tool_choice, Some(ToolChoice::Auto));
    }

    #[tokio::test]
    async fn test_all_tool_results_in_one_message() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_use(&[("t1", "MCP"), ("t2", "RAG"), ("t3", "Chroma")]),
            ModelResponse::text("Combined answer"),
        ]));
        let generator = Generator::new(model.clone(), POLICY);
        let manager = manager(false);
        let schemas = manager.schemas();

        let generation = generator
            .generate("q", None, Some(&schemas), Some(&manager))
            .await
            .unwrap();

        assert_eq!(generation.answer, "Combined answer");
        assert_eq!(generation.rounds, 1);
        assert_eq!(generation.tool_calls.len(), 3);

        let second = &model.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[1].role, Role::Assistant);
        assert_eq!(second.messages[1].content.len(), 4);

        let results = &second.messages[2];
        assert_eq!(results.role, Role::User);
        assert_eq!(
            results.content,
            vec![
                ContentBlock::tool_result("t1", "search_course_content result for MCP"),
                ContentBlock::tool_result("t2", "search_course_content result for RAG"),
                ContentBlock::tool_result("t3", "search_course_content result for Chroma"),
            ]
        );
        assert_eq!(generation.sources, vec![Source::new("Chroma - Lesson 1", None)]);
    }

    #[tokio::test]
    async fn test_round_bound_forces_final_call() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_use(&[("t1", "a")]),
            tool_use(&[("t2", "b")]),
            tool_use(&[("t3", "c")]),
            ModelResponse::text("unused"),
        ]));
        let generator = Generator::new(model.clone(), POLICY).with_max_tool_rounds(2);
        let manager = manager(false);
        let schemas = manager.schemas();

        let generation = generator
            .generate("q", None, Some(&schemas), Some(&manager))
            .await
            .unwrap();

        assert_eq!(model.call_count(), 3);
        assert_eq!(generation.rounds, 2);
        assert_eq!(generation.answer, "Let me look.");

        let requests = model.requests();
        assert_eq!(requests[0].tool_choice, Some(ToolChoice::Auto));
        assert_eq!(requests[1].tool_choice, Some(ToolChoice::Auto));
        assert_eq!(requests[2].tool_choice, None);
        assert_eq!(requests[2].tools.as_ref().map(Vec::len), Some(1));
        assert_eq!(requests[2].messages.len(), 5);
    }

    #[tokio::test]
    async fn test_zero_rounds_goes_straight_to_final_call() {
        let model = Arc::new(ScriptedModel::new(vec![ModelResponse::text("Only call")]));
        let generator = Generator::new(model.clone(), POLICY).with_max_tool_rounds(0);
        let manager = manager(false);
        let schemas = manager.schemas();

        let generation = generator
            .generate("q", None, Some(&schemas), Some(&manager))
            .await
            .unwrap();

        assert_eq!(generation.answer, "Only call");
        assert_eq!(model.call_count(), 1);
        assert_eq!(model.requests()[0].tool_choice, None);
    }

    #[tokio::test]
    async fn test_history_appended_to_system() {
        let model = Arc::new(ScriptedModel::new(vec![ModelResponse::text("ok")]));
        let generator = Generator::new(model.clone(), POLICY);

        generator
            .generate("q", Some("User: hi\nAssistant: hello"), None, None)
            .await
            .unwrap();
        generator.generate("q", Some(""), None, None).await.unwrap();

        let requests = model.requests();
        assert_eq!(
            requests[0].system,
            "You answer course questions.\n\nPrevious conversation:\nUser: hi\nAssistant: hello"
        );
        assert_eq!(requests[1].system, POLICY);
    }

    #[tokio::test]
    async fn test_empty_text_when_no_text_block() {
        let model = Arc::new(ScriptedModel::new(vec![ModelResponse {
            stop_reason: StopReason::EndTurn,
            content: vec![],
        }]));
        let generator = Generator::new(model, POLICY);

        let generation = generator.generate("q", None, None, None).await.unwrap();
        assert_eq!(generation.answer, "");
        assert!(generation.sources.is_empty());
    }

    #[tokio::test]
    async fn test_tool_failure_propagates() {
        let model = Arc::new(ScriptedModel::new(vec![tool_use(&[("t1", "MCP")])]));
        let generator = Generator::new(model.clone(), POLICY);
        let manager = manager(true);
        let schemas = manager.schemas();

        let err = generator
            .generate("q", None, Some(&schemas), Some(&manager))
            .await
            .unwrap_err();

        assert!(matches!(err, LektorError::Index(_)));
        assert_eq!(model.call_count(), 1);
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn complete(&self, _request: &ModelRequest) -> Result<ModelResponse> {
            Err(LektorError::Model("overloaded".to_string()))
        }
    }

    #[tokio::test]
    async fn test_tool_use_stop_without_tool_blocks_returns_text() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelResponse {
                stop_reason: StopReason::ToolUse,
                content: vec![ContentBlock::text("Nothing to look up")],
            },
            ModelResponse::text("never used"),
        ]));
        let generator = Generator::new(model.clone(), POLICY);
        let manager = manager(false);
        let schemas = manager.schemas();

        let generation = generator
            .generate("q", None, Some(&schemas), Some(&manager))
            .await
            .unwrap();

        assert_eq!(generation.answer, "Nothing to look up");
        assert_eq!(generation.rounds, 0);
        assert!(generation.tool_calls.is_empty());
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_use_stop_with_empty_content_adds_no_messages() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelResponse {
                stop_reason: StopReason::ToolUse,
                content: vec![],
            },
            ModelResponse::text("never used"),
        ]));
        let generator = Generator::new(model.clone(), POLICY);
        let manager = manager(false);
        let schemas = manager.schemas();

        let generation = generator
            .generate("q", None, Some(&schemas), Some(&manager))
            .await
            .unwrap();

        assert_eq!(generation.answer, "");
        assert_eq!(model.call_count(), 1);
        assert_eq!(model.requests()[0].messages, vec![Message::user("q")]);
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let generator = Generator::new(Arc::new(FailingModel), POLICY);
        let err = generator.generate("q", None, None, None).await.unwrap_err();
        assert!(matches!(err, LektorError::Model(_)));
    }

    #[test]
    fn test_from_settings() {
        let model = Arc::new(ScriptedModel::default());
        let settings = ModelSettings {
            max_tool_rounds: 4,
            max_tokens: 1200,
            ..ModelSettings::default()
        };
        let generator = Generator::from_settings(model, &settings, &Prompts::default());
        assert_eq!(generator.max_tool_rounds, 4);
        assert_eq!(generator.max_tokens, 1200);
        assert!(generator.system_prompt.contains("get_course_outline"));
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "search_course_content".to_string(),
            arguments: r#"{"query":"MCP"}"#.to_string(),
            result: "[MCP Course]\n...".to_string(),
        };
        assert_eq!(format!("{}", record), r#"search_course_content({"query":"MCP"})"#);
    }
}
