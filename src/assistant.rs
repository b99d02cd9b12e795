//! The course assistant: index, tools, generator and sessions wired together.

use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::generator::{Generator, ToolCallRecord};
use crate::index::{open_index, CourseIndex};
use crate::ingest::{ingest_folder, ChunkingConfig, IngestReport};
use crate::llm::{create_model, ChatModel};
use crate::session::SessionManager;
use crate::tools::{CourseOutlineTool, CourseSearchTool, Source, ToolManager};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Answer to one question.
#[derive(Debug, Clone)]
pub struct AssistantResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Summary of the indexed catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// Answers questions about the indexed courses.
pub struct CourseAssistant {
    index: Arc<dyn CourseIndex>,
    tools: ToolManager,
    generator: Generator,
    sessions: SessionManager,
    prompts: Prompts,
    chunking: ChunkingConfig,
}

impl CourseAssistant {
    /// Build an assistant around an existing model and index.
    pub fn new(
        model: Arc<dyn ChatModel>,
        index: Arc<dyn CourseIndex>,
        settings: &Settings,
        prompts: Prompts,
    ) -> Result<Self> {
        let mut tools = ToolManager::new();
        tools.register(Arc::new(CourseSearchTool::new(index.clone())))?;
        tools.register(Arc::new(CourseOutlineTool::new(index.clone())))?;

        Ok(Self {
            index,
            tools,
            generator: Generator::from_settings(model, &settings.model, &prompts),
            sessions: SessionManager::new(settings.session.max_history),
            prompts,
            chunking: ChunkingConfig::from(&settings.ingest),
        })
    }

    /// Build the configured model, embedder and index.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let model = create_model(settings)?;
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding));
        let index = open_index(settings, embedder)?;
        let prompts = Prompts::load(settings.prompts.custom_dir.as_deref())?;
        Self::new(model, index, settings, prompts)
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Answer a question, using and extending the session's history when a
    /// session id is given.
    #[instrument(skip(self, query))]
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<AssistantResponse> {
        info!("Processing question: {}", query);

        let history = match session_id {
            Some(id) => self.sessions.get_conversation_history(id).await,
            None => None,
        };

        let schemas = self.tools.schemas();
        let generation = self
            .generator
            .generate(
                &self.prompts.render_query(query),
                history.as_deref(),
                Some(&schemas),
                Some(&self.tools),
            )
            .await?;

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &generation.answer).await;
        }

        Ok(AssistantResponse {
            answer: generation.answer,
            sources: generation.sources,
            tool_calls: generation.tool_calls,
        })
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.index.course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }

    /// Ingest course documents from `dir`.
    pub async fn ingest(&self, dir: &Path, clear_existing: bool) -> Result<IngestReport> {
        ingest_folder(self.index.as_ref(), dir, clear_existing, &self.chunking).await
    }
}
