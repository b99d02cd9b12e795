//! Course index abstraction for Lektor.
//!
//! Stores course catalogs and lesson chunks with their embeddings and answers
//! the three lookups the assistant's tools need: filtered semantic search,
//! lesson link lookup and course outlines.

mod memory;
mod sqlite;

pub use memory::MemoryCourseIndex;
pub use sqlite::SqliteCourseIndex;

use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A lesson within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: i64,
    pub title: String,
    pub lesson_link: Option<String>,
}

/// Catalog entry for a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Course title, unique within the index.
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

/// A piece of lesson text ready for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub chunk_index: usize,
}

/// Metadata returned alongside each search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub chunk_index: usize,
}

/// Ranked search hits, or the reason no search could run.
///
/// `documents`, `metadata` and `distances` always have equal length, and are
/// all empty whenever `error` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    /// Distance to the query (lower is more relevant).
    pub distances: Vec<f32>,
    pub error: Option<String>,
}

impl SearchResults {
    /// Build results from `(document, metadata, distance)` hits in rank order.
    pub fn from_hits(hits: Vec<(String, ChunkMetadata, f32)>) -> Self {
        let mut results = Self::default();
        for (document, metadata, distance) in hits {
            results.documents.push(document);
            results.metadata.push(metadata);
            results.distances.push(distance);
        }
        results
    }

    /// Results carrying only an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

/// One line of a course outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonOutline {
    pub lesson_number: Option<i64>,
    pub lesson_title: Option<String>,
}

/// Structural listing of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOutline {
    pub title: String,
    pub course_link: Option<String>,
    pub lessons: Vec<LessonOutline>,
}

impl From<&Course> for CourseOutline {
    fn from(course: &Course) -> Self {
        Self {
            title: course.title.clone(),
            course_link: course.course_link.clone(),
            lessons: course
                .lessons
                .iter()
                .map(|l| LessonOutline {
                    lesson_number: Some(l.lesson_number),
                    lesson_title: Some(l.title.clone()),
                })
                .collect(),
        }
    }
}

/// Trait for course index implementations.
#[async_trait]
pub trait CourseIndex: Send + Sync {
    /// Semantic search over lesson chunks, optionally narrowed to a course
    /// (fuzzy-matched by name) and a lesson number.
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
    ) -> Result<SearchResults>;

    /// Link for a lesson of a course with the exact given title.
    async fn get_lesson_link(&self, course_title: &str, lesson_number: i64) -> Result<Option<String>>;

    /// Outline of the course best matching `course_title`.
    async fn get_course_outline(&self, course_title: &str) -> Result<Option<CourseOutline>>;

    /// Add a course and its chunks. Returns the number of chunks stored.
    async fn add_course(&self, course: &Course, chunks: &[CourseChunk]) -> Result<usize>;

    /// Titles of every indexed course.
    async fn course_titles(&self) -> Result<Vec<String>>;

    /// Remove all courses and chunks.
    async fn clear(&self) -> Result<()>;
}

/// Open the configured index backend.
pub fn open_index(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn CourseIndex>> {
    let max_results = settings.index.max_results;
    match settings.index.provider.as_str() {
        "memory" => Ok(Arc::new(MemoryCourseIndex::new(embedder, max_results))),
        _ => Ok(Arc::new(SqliteCourseIndex::new(
            &settings.sqlite_path(),
            embedder,
            max_results,
        )?)),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Match a course name against titles without embeddings: exact
/// (case-insensitive) first, then substring.
pub(crate) fn match_title_text(name: &str, titles: &[String]) -> Option<String> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    titles
        .iter()
        .find(|t| t.to_lowercase() == needle)
        .or_else(|| titles.iter().find(|t| t.to_lowercase().contains(&needle)))
        .cloned()
}

/// The title whose embedding is closest to `query_embedding`.
pub(crate) fn nearest_title(query_embedding: &[f32], catalog: &[(String, Vec<f32>)]) -> Option<String> {
    catalog
        .iter()
        .map(|(title, embedding)| (title, cosine_similarity(query_embedding, embedding)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(title, _)| title.clone())
}

/// Rank chunks by distance to the query and keep the best `limit`.
pub(crate) fn rank_chunks(
    query_embedding: &[f32],
    chunks: impl IntoIterator<Item = (CourseChunk, Vec<f32>)>,
    limit: usize,
) -> SearchResults {
    let mut hits: Vec<(String, ChunkMetadata, f32)> = chunks
        .into_iter()
        .map(|(chunk, embedding)| {
            let distance = 1.0 - cosine_similarity(query_embedding, &embedding);
            let metadata = ChunkMetadata {
                course_title: chunk.course_title,
                lesson_number: chunk.lesson_number,
                chunk_index: chunk.chunk_index,
            };
            (chunk.content, metadata, distance)
        })
        .collect();

    hits.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);

    SearchResults::from_hits(hits)
}

/// Message used when a course filter matches nothing.
pub(crate) fn course_not_found(name: &str) -> String {
    format!("No course found matching '{}'", name)
}
