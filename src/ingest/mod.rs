//! Course document ingestion.
//!
//! Reads course documents from a folder, splits each lesson into
//! sentence-aligned chunks and adds them to a [`CourseIndex`].

mod chunker;
mod parser;

pub use chunker::{ChunkingConfig, SentenceChunker};
pub use parser::{CourseDocument, DocumentParser, LessonText};

use crate::error::{LektorError, Result};
use crate::index::{Course, CourseChunk, CourseIndex};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

const EXTENSIONS: &[&str] = &["txt", "md"];

/// Outcome of ingesting a folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub courses_added: usize,
    pub chunks_added: usize,
    /// Courses already present in the index.
    pub skipped: usize,
    /// Files that could not be read or parsed.
    pub failed: usize,
}

/// Turns course documents into catalog entries and chunks.
pub struct CourseLoader {
    parser: DocumentParser,
    chunker: SentenceChunker,
}

impl CourseLoader {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Ok(Self {
            parser: DocumentParser::new()?,
            chunker: SentenceChunker::new(config)?,
        })
    }

    /// Parse and chunk document text.
    pub fn load_str(&self, text: &str, fallback_title: &str) -> Result<(Course, Vec<CourseChunk>)> {
        let document = self.parser.parse(text, fallback_title)?;
        let title = document.course.title.clone();

        let mut chunks = Vec::new();
        for lesson in &document.lessons {
            for (i, content) in self.chunker.chunk(&lesson.content).into_iter().enumerate() {
                let content = match lesson.lesson_number {
                    Some(n) if i == 0 => format!("Lesson {} content: {}", n, content),
                    _ => content,
                };
                chunks.push(CourseChunk {
                    content,
                    course_title: title.clone(),
                    lesson_number: lesson.lesson_number,
                    chunk_index: chunks.len(),
                });
            }
        }

        Ok((document.course, chunks))
    }

    /// Read, parse and chunk a document file.
    pub fn load_file(&self, path: &Path) -> Result<(Course, Vec<CourseChunk>)> {
        let text = std::fs::read_to_string(path)?;
        let fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.load_str(&text, &fallback)
    }
}

/// Course documents directly inside `dir`, sorted by path.
pub fn course_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(LektorError::Ingest(format!("Not a directory: {}", dir.display())));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| EXTENSIONS.contains(&e.to_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Ingest every course document in `dir`.
///
/// Courses whose title is already indexed are skipped. Unreadable or
/// malformed files are logged and counted, not fatal.
#[instrument(skip(index, config))]
pub async fn ingest_folder(
    index: &dyn CourseIndex,
    dir: &Path,
    clear_existing: bool,
    config: &ChunkingConfig,
) -> Result<IngestReport> {
    let files = course_files(dir)?;
    let loader = CourseLoader::new(config.clone())?;

    if clear_existing {
        info!("Clearing existing course index");
        index.clear().await?;
    }

    let mut known: HashSet<String> = index.course_titles().await?.into_iter().collect();
    let mut report = IngestReport::default();

    for path in files {
        let (course, chunks) = match loader.load_file(&path) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                report.failed += 1;
                continue;
            }
        };

        if known.contains(&course.title) {
            info!("Course already indexed, skipping: {}", course.title);
            report.skipped += 1;
            continue;
        }

        let added = index.add_course(&course, &chunks).await?;
        info!("Added course '{}' ({} chunks)", course.title, added);
        report.courses_added += 1;
        report.chunks_added += added;
        known.insert(course.title);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::KeywordEmbedder;
    use crate::index::MemoryCourseIndex;
    use std::sync::Arc;

    const MCP: &str = "Course Title: MCP Course
Course Link: https://x/mcp
Course Instructor: Elie

Lesson 1: Intro
Lesson Link: https://x/mcp/1
MCP is a protocol. It connects models to tools.

Lesson 2: Servers
Servers expose tools.
";

    fn index() -> MemoryCourseIndex {
        MemoryCourseIndex::new(Arc::new(KeywordEmbedder::new(vec!["mcp", "tool", "server"])), 5)
    }

    #[test]
    fn test_load_str_prefixes_first_lesson_chunk() {
        let loader = CourseLoader::new(ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 0,
        })
        .unwrap();
        let (course, chunks) = loader.load_str(MCP, "mcp").unwrap();

        assert_eq!(course.title, "MCP Course");
        assert_eq!(course.lessons.len(), 2);

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Lesson 1 content: MCP is a protocol.",
                "It connects models to tools.",
                "Lesson 2 content: Servers expose tools.",
            ]
        );
        assert_eq!(
            chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(chunks[1].lesson_number, Some(1));
    }

    #[test]
    fn test_course_files_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "x").unwrap();
        std::fs::write(dir.path().join("a.md"), "x").unwrap();
        std::fs::write(dir.path().join("c.pdf"), "x").unwrap();

        let files = course_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);

        assert!(course_files(&dir.path().join("missing")).is_err());
    }

    #[tokio::test]
    async fn test_ingest_folder_skips_known_courses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mcp.txt"), MCP).unwrap();
        std::fs::write(
            dir.path().join("rag.txt"),
            "Course Title: RAG Course\n\nLesson 1: Basics\nRetrieval first.",
        )
        .unwrap();

        let index = index();
        let config = ChunkingConfig::default();

        let report = ingest_folder(&index, dir.path(), false, &config).await.unwrap();
        assert_eq!(report.courses_added, 2);
        assert_eq!(report.chunks_added, 3);
        assert_eq!(report.skipped, 0);

        let again = ingest_folder(&index, dir.path(), false, &config).await.unwrap();
        assert_eq!(again.courses_added, 0);
        assert_eq!(again.skipped, 2);

        let cleared = ingest_folder(&index, dir.path(), true, &config).await.unwrap();
        assert_eq!(cleared.courses_added, 2);
        assert_eq!(index.course_titles().await.unwrap().len(), 2);
    }
}
