//! Tool registration, dispatch and per-query citation tracking.

use super::{Source, Tool, ToolOutput};
use crate::error::{LektorError, Result};
use crate::llm::ToolSchema;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry of tools available to the model.
#[derive(Default, Clone)]
pub struct ToolManager {
    tools: Vec<(String, Arc<dyn Tool>)>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its schema name.
    ///
    /// Registering a name that already exists replaces that tool but keeps
    /// its position.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if name.trim().is_empty() {
            return Err(LektorError::Config("Tool schema must have a name".to_string()));
        }

        match self.tools.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => {
                debug!("Replacing tool '{}'", name);
                slot.1 = tool;
            }
            None => {
                debug!("Registered tool '{}'", name);
                self.tools.push((name, tool));
            }
        }
        Ok(())
    }

    /// Schemas of all registered tools, in registration order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|(_, tool)| tool.schema()).collect()
    }

    /// Names of all registered tools, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the named tool.
    ///
    /// An unknown name is reported back as text so the model can recover.
    pub async fn dispatch(&self, name: &str, args: &Value) -> Result<ToolOutput> {
        let Some((_, tool)) = self.tools.iter().find(|(existing, _)| existing == name) else {
            warn!("Model requested unknown tool '{}'", name);
            return Ok(ToolOutput::text(format!("Tool '{}' not found", name)));
        };

        debug!("Dispatching tool '{}'", name);
        tool.execute(args).await
    }

    /// A fresh citation tracker for one query.
    pub fn source_tracker(&self) -> SourceTracker {
        SourceTracker {
            slots: self
                .tools
                .iter()
                .map(|(name, _)| (name.clone(), Vec::new()))
                .collect(),
        }
    }
}

/// Citations gathered while answering one query, one slot per tool.
#[derive(Debug, Clone, Default)]
pub struct SourceTracker {
    slots: Vec<(String, Vec<Source>)>,
}

impl SourceTracker {
    /// Store a tool's citations, replacing what that tool reported before.
    /// Outputs without citations leave the slot untouched.
    pub fn record(&mut self, tool: &str, output: &ToolOutput) {
        let Some(sources) = &output.sources else {
            return;
        };
        if let Some(slot) = self.slots.iter_mut().find(|(name, _)| name == tool) {
            slot.1 = sources.clone();
        }
    }

    /// Take the first non-empty citation list in registration order and
    /// reset every slot.
    pub fn drain(&mut self) -> Vec<Source> {
        let sources = self
            .slots
            .iter_mut()
            .find(|(_, sources)| !sources.is_empty())
            .map(|(_, sources)| std::mem::take(sources))
            .unwrap_or_default();
        self.clear();
        sources
    }

    pub fn clear(&mut self) {
        for (_, sources) in &mut self.slots {
            sources.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool {
        name: &'static str,
        cite: Option<&'static str>,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema::new(self.name, "Echo", json!({"type": "object", "properties": {}}))
        }

        async fn execute(&self, args: &Value) -> Result<ToolOutput> {
            let text = format!("{} got {}", self.name, args);
            Ok(match self.cite {
                Some(cite) => ToolOutput::with_sources(text, vec![Source::new(cite, None)]),
                None => ToolOutput::text(text),
            })
        }
    }

    fn echo(name: &'static str, cite: Option<&'static str>) -> Arc<dyn Tool> {
        Arc::new(EchoTool { name, cite })
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let manager = ToolManager::new();
        let output = manager.dispatch("does_not_exist", &json!({})).await.unwrap();
        assert!(output.text.contains("not found"));
        assert!(output.text.contains("does_not_exist"));
        assert!(output.sources.is_none());
    }

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let mut manager = ToolManager::new();
        manager.register(echo("alpha", None)).unwrap();
        manager.register(echo("beta", None)).unwrap();

        let names: Vec<String> = manager.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        let output = manager.dispatch("beta", &json!({"q": 1})).await.unwrap();
        assert_eq!(output.text, r#"beta got {"q":1}"#);
    }

    #[tokio::test]
    async fn test_reregister_replaces_in_place() {
        let mut manager = ToolManager::new();
        manager.register(echo("alpha", None)).unwrap();
        manager.register(echo("beta", None)).unwrap();
        manager.register(echo("alpha", Some("cited"))).unwrap();

        assert_eq!(manager.names(), vec!["alpha", "beta"]);
        let output = manager.dispatch("alpha", &json!({})).await.unwrap();
        assert_eq!(output.sources.unwrap()[0].text, "cited");
    }

    #[test]
    fn test_register_rejects_empty_name() {
        let mut manager = ToolManager::new();
        let err = manager.register(echo("", None)).unwrap_err();
        assert!(matches!(err, LektorError::Config(_)));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_tracker_drains_first_non_empty_in_registration_order() {
        let mut manager = ToolManager::new();
        manager.register(echo("outline", None)).unwrap();
        manager.register(echo("search", None)).unwrap();
        manager.register(echo("other", None)).unwrap();

        let mut tracker = manager.source_tracker();
        tracker.record("other", &ToolOutput::with_sources("", vec![Source::new("C", None)]));
        tracker.record("search", &ToolOutput::with_sources("", vec![Source::new("A", None)]));
        tracker.record("search", &ToolOutput::with_sources("", vec![Source::new("B", None)]));
        tracker.record("search", &ToolOutput::text("no citations"));

        assert_eq!(tracker.drain(), vec![Source::new("B", None)]);
        assert!(tracker.drain().is_empty());
    }

    #[test]
    fn test_tracker_clear() {
        let mut manager = ToolManager::new();
        manager.register(echo("search", None)).unwrap();

        let mut tracker = manager.source_tracker();
        tracker.record("search", &ToolOutput::with_sources("", vec![Source::new("A", None)]));
        tracker.clear();
        assert!(tracker.drain().is_empty());
    }
}
