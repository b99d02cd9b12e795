//! Course outline lookup.

use super::{decode_args, Tool, ToolOutput};
use crate::error::Result;
use crate::index::{CourseIndex, CourseOutline};
use crate::llm::ToolSchema;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const NAME: &str = "get_course_outline";

#[derive(Debug, Deserialize)]
struct OutlineArgs {
    course_title: String,
}

/// Returns a course's link and lesson list.
pub struct CourseOutlineTool {
    index: Arc<dyn CourseIndex>,
}

impl CourseOutlineTool {
    pub fn new(index: Arc<dyn CourseIndex>) -> Self {
        Self { index }
    }
}

fn format_outline(outline: &CourseOutline) -> String {
    let mut lines = vec![
        format!("Course: {}", outline.title),
        format!("Link: {}", outline.course_link.as_deref().unwrap_or("N/A")),
        String::new(),
        format!("Lessons ({} total):", outline.lessons.len()),
    ];

    for lesson in &outline.lessons {
        let number = lesson
            .lesson_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        let title = lesson.lesson_title.as_deref().unwrap_or("Untitled");
        lines.push(format!("  Lesson {}: {}", number, title));
    }

    lines.join("\n")
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            NAME,
            "Get the outline/syllabus/structure of a course, including its list of lessons. \
             Use this when the user asks about what lessons are in a course, the course \
             structure, or course syllabus.",
            json!({
                "type": "object",
                "properties": {
                    "course_title": {
                        "type": "string",
                        "description": "Course title or partial name (e.g. 'MCP', 'computer use')"
                    }
                },
                "required": ["course_title"]
            }),
        )
    }

    async fn execute(&self, args: &Value) -> Result<ToolOutput> {
        let args: OutlineArgs = decode_args(NAME, args)?;

        let text = match self.index.get_course_outline(&args.course_title).await? {
            Some(outline) => format_outline(&outline),
            None => format!("No course found matching '{}'.", args.course_title),
        };
        Ok(ToolOutput::text(text))
    }
}
