//! Semantic search over lesson content, with citations.

use super::{decode_args, Source, Tool, ToolOutput};
use crate::error::Result;
use crate::index::{CourseIndex, SearchResults};
use crate::llm::ToolSchema;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

const NAME: &str = "search_course_content";

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    lesson_number: Option<i64>,
}

/// Searches course materials, optionally narrowed to a course and lesson.
pub struct CourseSearchTool {
    index: Arc<dyn CourseIndex>,
}

impl CourseSearchTool {
    pub fn new(index: Arc<dyn CourseIndex>) -> Self {
        Self { index }
    }

    async fn format_results(&self, results: &SearchResults) -> Result<ToolOutput> {
        let mut formatted = Vec::with_capacity(results.len());
        let mut seen: HashSet<(&str, Option<i64>)> = HashSet::new();
        let mut sources = Vec::new();

        for (document, meta) in results.documents.iter().zip(&results.metadata) {
            let label = match meta.lesson_number {
                Some(n) => format!("{} - Lesson {}", meta.course_title, n),
                None => meta.course_title.clone(),
            };

            if seen.insert((meta.course_title.as_str(), meta.lesson_number)) {
                let link = match meta.lesson_number {
                    Some(n) => self.index.get_lesson_link(&meta.course_title, n).await?,
                    None => None,
                };
                sources.push(Source::new(label.clone(), link));
            }

            formatted.push(format!("[{}]\n{}", label, document));
        }

        Ok(ToolOutput::with_sources(formatted.join("\n\n"), sources))
    }
}

/// Message for a search that matched nothing, naming the filters used.
fn empty_message(course_name: Option<&str>, lesson_number: Option<i64>) -> String {
    let mut message = String::from("No relevant content found");
    if let Some(course) = course_name {
        message.push_str(&format!(" in course '{}'", course));
    }
    if let Some(lesson) = lesson_number {
        message.push_str(&format!(" in lesson {}", lesson));
    }
    message.push('.');
    message
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            NAME,
            "Search course materials with smart course name matching and lesson filtering",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    #[instrument(skip_all)]
    async fn execute(&self, args: &Value) -> Result<ToolOutput> {
        let args: SearchArgs = decode_args(NAME, args)?;

        debug!(
            query = %args.query,
            course = ?args.course_name,
            lesson = ?args.lesson_number,
            "Searching course content"
        );

        let results = self
            .index
            .search(&args.query, args.course_name.as_deref(), args.lesson_number)
            .await?;

        if let Some(error) = &results.error {
            return Ok(ToolOutput::text(error.clone()));
        }

        if results.is_empty() {
            let course_name = args.course_name.as_deref().filter(|c| !c.is_empty());
            return Ok(ToolOutput::text(empty_message(course_name, args.lesson_number)));
        }

        self.format_results(&results).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LektorError;
    use crate::index::ChunkMetadata;
    use crate::tools::test_support::StubIndex;

    fn hit(course: &str, lesson: Option<i64>, index: usize) -> ChunkMetadata {
        ChunkMetadata {
            course_title: course.to_string(),
            lesson_number: lesson,
            chunk_index: index,
        }
    }

    fn stub(results: SearchResults) -> Arc<StubIndex> {
        Arc::new(StubIndex {
            results,
            ..StubIndex::default()
        })
    }

    #[tokio::test]
    async fn test_formats_hits_and_dedups_sources() {
        let mut index = StubIndex {
            results: SearchResults::from_hits(vec![
                ("First chunk".to_string(), hit("MCP Course", Some(1), 0), 0.1),
                ("Second chunk".to_string(), hit("MCP Course", Some(1), 1), 0.2),
                ("Third chunk".to_string(), hit("Computer Use", None, 4), 0.3),
            ]),
            ..StubIndex::default()
        };
        index
            .links
            .insert(("MCP Course".to_string(), 1), "https://x/mcp/1".to_string());
        let index = Arc::new(index);
        let tool = CourseSearchTool::new(index.clone());

        let output = tool.execute(&json!({"query": "servers"})).await.unwrap();

        assert_eq!(
            output.text,
            "[MCP Course - Lesson 1]\nFirst chunk\n\n\
             [MCP Course - Lesson 1]\nSecond chunk\n\n\
             [Computer Use]\nThird chunk"
        );
        assert_eq!(
            output.sources.unwrap(),
            vec![
                Source::new("MCP Course - Lesson 1", Some("https://x/mcp/1".to_string())),
                Source::new("Computer Use", None),
            ]
        );
        assert_eq!(
            *index.link_lookups.lock().unwrap(),
            vec![("MCP Course".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_passes_filters_through() {
        let index = stub(SearchResults::default());
        let tool = CourseSearchTool::new(index.clone());

        tool.execute(&json!({"query": "q", "course_name": "MCP", "lesson_number": 2}))
            .await
            .unwrap();

        assert_eq!(
            *index.searches.lock().unwrap(),
            vec![("q".to_string(), Some("MCP".to_string()), Some(2))]
        );
    }

    #[tokio::test]
    async fn test_empty_course_name_reaches_index_unchanged() {
        let index = stub(SearchResults::default());
        let tool = CourseSearchTool::new(index.clone());

        tool.execute(&json!({"query": "q", "course_name": ""}))
            .await
            .unwrap();

        assert_eq!(
            *index.searches.lock().unwrap(),
            vec![("q".to_string(), Some(String::new()), None)]
        );
    }

    #[tokio::test]
    async fn test_empty_results_name_filters() {
        let tool = CourseSearchTool::new(stub(SearchResults::default()));

        let output = tool
            .execute(&json!({"query": "q", "course_name": "MCP Course", "lesson_number": 5}))
            .await
            .unwrap();
        assert!(output
            .text
            .contains("No relevant content found in course 'MCP Course' in lesson 5."));
        assert!(output.sources.is_none());

        let output = tool.execute(&json!({"query": "q"})).await.unwrap();
        assert_eq!(output.text, "No relevant content found.");

        let output = tool
            .execute(&json!({"query": "q", "course_name": "", "lesson_number": 0}))
            .await
            .unwrap();
        assert_eq!(output.text, "No relevant content found in lesson 0.");
    }

    #[tokio::test]
    async fn test_index_error_returned_verbatim() {
        let tool = CourseSearchTool::new(stub(SearchResults::error("No course found matching 'Rust'")));
        let output = tool
            .execute(&json!({"query": "q", "course_name": "Rust"}))
            .await
            .unwrap();
        assert_eq!(output.text, "No course found matching 'Rust'");
        assert!(output.sources.is_none());
    }

    #[tokio::test]
    async fn test_failures_propagate() {
        let index = Arc::new(StubIndex {
            fail: true,
            ..StubIndex::default()
        });
        let tool = CourseSearchTool::new(index);
        assert!(matches!(
            tool.execute(&json!({"query": "q"})).await,
            Err(LektorError::Index(_))
        ));

        let tool = CourseSearchTool::new(stub(SearchResults::default()));
        assert!(matches!(
            tool.execute(&json!({"lesson_number": "two"})).await,
            Err(LektorError::ToolArguments { .. })
        ));
    }
}
