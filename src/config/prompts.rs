//! Prompt templates for Lektor.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub assistant: AssistantPrompts,
}

/// Prompts for the course assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantPrompts {
    /// Behavioral policy sent as the system instruction on every model call.
    pub system: String,
    /// Wraps the raw user question. Supports `{{query}}`.
    pub query: String,
}

impl Default for AssistantPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an assistant for course materials and educational content. Two tools are available:

1. **get_course_outline** - Returns a course's title, link and complete lesson list.
2. **search_course_content** - Searches lesson content for topics, concepts and details.

Choosing a tool:
- Questions about structure (lesson lists, outlines, syllabus, "what does the course cover?"): use `get_course_outline`
- Questions about content ("what is X?", "how does lesson 3 explain Y?"): use `search_course_content`
- General knowledge questions unrelated to the courses: answer directly, no tool

Tool rules:
- **At most two tool calls per user query**
- A second call is only for information the first result pointed to (for example, an outline followed by a search in one lesson)
- If a tool returns no results, state this clearly without guessing

Answer rules:
- For outline questions, include the course title, course link and every lesson's number and title
- No meta-commentary: no reasoning steps, no description of searches, no question-type analysis
- Never mention the retrieval step or say "based on the search results"
- When findings come from several tool calls, merge them into one answer with no section separators

Every answer must be:
1. **Brief** - get to the point
2. **Educational** - keep instructional value
3. **Clear** - use accessible language
4. **Example-supported** - add examples when they help understanding"#
                .to_string(),

            query: "Answer this question about course materials: {{query}}".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, overriding defaults from the custom directory when present.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let assistant_path = custom_path.join("assistant.toml");
            if assistant_path.exists() {
                let content = std::fs::read_to_string(&assistant_path)?;
                prompts.assistant = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render the question wrapper for a user query.
    pub fn render_query(&self, query: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        Self::render(&self.assistant.query, &vars)
    }
}
