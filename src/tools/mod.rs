//! Tools the model can call while answering, and the registry that runs them.
//!
//! A tool returns its text for the model together with the citations it
//! produced. Nothing is stored on the tool itself, so one registry can serve
//! concurrent queries.

mod outline;
mod registry;
mod search;

pub use outline::CourseOutlineTool;
pub use registry::{SourceTracker, ToolManager};
pub use search::CourseSearchTool;

use crate::error::Result;
use crate::llm::ToolSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A citation shown to the caller next to the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Display text, e.g. `"MCP Course - Lesson 2"`.
    pub text: String,
    pub link: Option<String>,
}

impl Source {
    pub fn new(text: impl Into<String>, link: Option<String>) -> Self {
        Self {
            text: text.into(),
            link,
        }
    }
}

/// Result of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Text handed back to the model as the tool result.
    pub text: String,
    /// Citations for this invocation, if the tool produces any.
    pub sources: Option<Vec<Source>>,
}

impl ToolOutput {
    /// Output with text only.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: None,
        }
    }

    pub fn with_sources(text: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            text: text.into(),
            sources: Some(sources),
        }
    }
}

/// A named unit of work the model can request.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Schema advertised to the model. The name is the dispatch key.
    fn schema(&self) -> ToolSchema;

    /// Run the tool with the model-supplied arguments.
    async fn execute(&self, args: &Value) -> Result<ToolOutput>;
}

/// Decode a tool's argument object into its typed form.
pub(crate) fn decode_args<T: serde::de::DeserializeOwned>(tool: &str, args: &Value) -> Result<T> {
    serde_json::from_value(args.clone()).map_err(|e| crate::error::LektorError::ToolArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}
