//! Course document parsing.
//!
//! A course document starts with header lines:
//!
//! ```text
//! Course Title: Building Towards Computer Use with Anthropic
//! Course Link: https://www.deeplearning.ai/short-courses/...
//! Course Instructor: Colt Steele
//! ```
//!
//! followed by lessons, each introduced by `Lesson <n>: <title>` and an
//! optional `Lesson Link: <url>` line.

use crate::error::{LektorError, Result};
use crate::index::{Course, Lesson};
use regex::Regex;

/// Text of one lesson, before chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonText {
    /// `None` for text that appears before any lesson marker.
    pub lesson_number: Option<i64>,
    pub content: String,
}

/// A parsed course document.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDocument {
    pub course: Course,
    pub lessons: Vec<LessonText>,
}

/// Parses course documents into catalog entries and lesson text.
pub struct DocumentParser {
    header_re: Regex,
    lesson_re: Regex,
    lesson_link_re: Regex,
}

impl DocumentParser {
    pub fn new() -> Result<Self> {
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|e| LektorError::Ingest(format!("Invalid pattern: {}", e)))
        };

        Ok(Self {
            header_re: build(r"(?i)^course\s+(title|link|instructor)\s*:\s*(.*)$")?,
            lesson_re: build(r"(?i)^lesson\s+(\d+)\s*:\s*(.+)$")?,
            lesson_link_re: build(r"(?i)^lesson\s+link\s*:\s*(.+)$")?,
        })
    }

    /// Parse a document. `fallback_title` is used when the header has no title.
    pub fn parse(&self, text: &str, fallback_title: &str) -> Result<CourseDocument> {
        let mut title = None;
        let mut course_link = None;
        let mut instructor = None;

        let mut lessons: Vec<Lesson> = Vec::new();
        let mut texts: Vec<LessonText> = Vec::new();
        let mut current = LessonText {
            lesson_number: None,
            content: String::new(),
        };
        let mut expect_link = false;

        for line in text.lines() {
            let trimmed = line.trim();

            if lessons.is_empty() {
                if let Some(caps) = self.header_re.captures(trimmed) {
                    let value = caps[2].trim().to_string();
                    let value = (!value.is_empty()).then_some(value);
                    match caps[1].to_lowercase().as_str() {
                        "title" => title = value,
                        "link" => course_link = value,
                        _ => instructor = value,
                    }
                    continue;
                }
            }

            if let Some(caps) = self.lesson_re.captures(trimmed) {
                let number: i64 = caps[1]
                    .parse()
                    .map_err(|e| LektorError::Ingest(format!("Bad lesson number '{}': {}", &caps[1], e)))?;

                let previous = std::mem::replace(
                    &mut current,
                    LessonText {
                        lesson_number: Some(number),
                        content: String::new(),
                    },
                );
                push_text(&mut texts, previous);
                lessons.push(Lesson {
                    lesson_number: number,
                    title: caps[2].trim().to_string(),
                    lesson_link: None,
                });
                expect_link = true;
                continue;
            }

            if expect_link {
                if let Some(caps) = self.lesson_link_re.captures(trimmed) {
                    if let Some(lesson) = lessons.last_mut() {
                        lesson.lesson_link = Some(caps[1].trim().to_string());
                    }
                    continue;
                }
                if !trimmed.is_empty() {
                    expect_link = false;
                }
            }

            if !current.content.is_empty() {
                current.content.push('\n');
            }
            current.content.push_str(line);
        }
        push_text(&mut texts, current);

        let title = title.unwrap_or_else(|| fallback_title.to_string());
        if title.trim().is_empty() {
            return Err(LektorError::Ingest("Course document has no title".to_string()));
        }

        Ok(CourseDocument {
            course: Course {
                title,
                course_link,
                instructor,
                lessons,
            },
            lessons: texts,
        })
    }
}

fn push_text(texts: &mut Vec<LessonText>, mut text: LessonText) {
    text.content = text.content.trim().to_string();
    if !text.content.is_empty() {
        texts.push(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Course Title: MCP: Build Rich-Context AI Apps
Course Link: https://example.com/mcp
Course Instructor: Elie Schoppik

Lesson 0: Introduction
Lesson Link: https://example.com/mcp/0
Welcome to the course. MCP connects models to tools.

Lesson 1: Why MCP
MCP standardizes how applications provide context.
It was released by Anthropic.
";

    #[test]
    fn test_parse_headers_and_lessons() {
        let parser = DocumentParser::new().unwrap();
        let doc = parser.parse(DOC, "fallback").unwrap();

        assert_eq!(doc.course.title, "MCP: Build Rich-Context AI Apps");
        assert_eq!(doc.course.course_link.as_deref(), Some("https://example.com/mcp"));
        assert_eq!(doc.course.instructor.as_deref(), Some("Elie Schoppik"));

        assert_eq!(
            doc.course.lessons,
            vec![
                Lesson {
                    lesson_number: 0,
                    title: "Introduction".to_string(),
                    lesson_link: Some("https://example.com/mcp/0".to_string()),
                },
                Lesson {
                    lesson_number: 1,
                    title: "Why MCP".to_string(),
                    lesson_link: None,
                },
            ]
        );

        assert_eq!(doc.lessons.len(), 2);
        assert_eq!(doc.lessons[0].lesson_number, Some(0));
        assert_eq!(
            doc.lessons[0].content,
            "Welcome to the course. MCP connects models to tools."
        );
        assert_eq!(
            doc.lessons[1].content,
            "MCP standardizes how applications provide context.\nIt was released by Anthropic."
        );
    }

    #[test]
    fn test_document_without_lessons() {
        let parser = DocumentParser::new().unwrap();
        let doc = parser.parse("Just some notes.\nMore notes.", "notes").unwrap();

        assert_eq!(doc.course.title, "notes");
        assert!(doc.course.lessons.is_empty());
        assert_eq!(doc.lessons.len(), 1);
        assert_eq!(doc.lessons[0].lesson_number, None);
    }

    #[test]
    fn test_missing_title_is_an_error() {
        let parser = DocumentParser::new().unwrap();
        assert!(matches!(
            parser.parse("Lesson 1: Intro\ntext", ""),
            Err(LektorError::Ingest(_))
        ));
    }
}
