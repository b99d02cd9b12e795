//! In-memory course index implementation.
//!
//! Useful for testing and small course collections.

use super::{
    course_not_found, match_title_text, nearest_title, rank_chunks, Course, CourseChunk,
    CourseIndex, CourseOutline, SearchResults,
};
use crate::embedding::Embedder;
use crate::error::{LektorError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

struct StoredCourse {
    course: Course,
    embedding: Vec<f32>,
}

/// In-memory course index.
pub struct MemoryCourseIndex {
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    courses: RwLock<Vec<StoredCourse>>,
    chunks: RwLock<Vec<(CourseChunk, Vec<f32>)>>,
}

impl MemoryCourseIndex {
    /// Create a new in-memory course index.
    pub fn new(embedder: Arc<dyn Embedder>, max_results: usize) -> Self {
        Self {
            embedder,
            max_results,
            courses: RwLock::new(Vec::new()),
            chunks: RwLock::new(Vec::new()),
        }
    }

    async fn resolve_course(&self, name: &str) -> Result<Option<String>> {
        let catalog: Vec<(String, Vec<f32>)> = {
            let courses = self.courses.read().await;
            courses
                .iter()
                .map(|c| (c.course.title.clone(), c.embedding.clone()))
                .collect()
        };

        if catalog.is_empty() {
            return Ok(None);
        }

        let titles: Vec<String> = catalog.iter().map(|(t, _)| t.clone()).collect();
        if let Some(title) = match_title_text(name, &titles) {
            return Ok(Some(title));
        }

        let embedding = self.embedder.embed(name).await?;
        Ok(nearest_title(&embedding, &catalog))
    }
}

#[async_trait]
impl CourseIndex for MemoryCourseIndex {
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
    ) -> Result<SearchResults> {
        let course_title = match course_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => match self.resolve_course(name).await? {
                Some(title) => Some(title),
                None => return Ok(SearchResults::error(course_not_found(name))),
            },
            None => None,
        };

        let query_embedding = self.embedder.embed(query).await?;

        let chunks = self.chunks.read().await;
        let candidates = chunks
            .iter()
            .filter(|(chunk, _)| {
                course_title.as_ref().map_or(true, |t| &chunk.course_title == t)
                    && lesson_number.map_or(true, |n| chunk.lesson_number == Some(n))
            })
            .cloned();

        let results = rank_chunks(&query_embedding, candidates, self.max_results);
        debug!("Found {} matching chunks", results.len());
        Ok(results)
    }

    async fn get_lesson_link(&self, course_title: &str, lesson_number: i64) -> Result<Option<String>> {
        let courses = self.courses.read().await;
        Ok(courses
            .iter()
            .find(|c| c.course.title == course_title)
            .and_then(|c| c.course.lessons.iter().find(|l| l.lesson_number == lesson_number))
            .and_then(|l| l.lesson_link.clone()))
    }

    async fn get_course_outline(&self, course_title: &str) -> Result<Option<CourseOutline>> {
        let Some(title) = self.resolve_course(course_title).await? else {
            return Ok(None);
        };

        let courses = self.courses.read().await;
        Ok(courses
            .iter()
            .find(|c| c.course.title == title)
            .map(|c| CourseOutline::from(&c.course)))
    }

    async fn add_course(&self, course: &Course, chunks: &[CourseChunk]) -> Result<usize> {
        let title_embedding = self.embedder.embed(&course.title).await?;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(LektorError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        {
            let mut courses = self.courses.write().await;
            courses.retain(|c| c.course.title != course.title);
            courses.push(StoredCourse {
                course: course.clone(),
                embedding: title_embedding,
            });
        }

        let mut stored = self.chunks.write().await;
        stored.retain(|(c, _)| c.course_title != course.title);
        stored.extend(chunks.iter().cloned().zip(embeddings));

        Ok(chunks.len())
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let courses = self.courses.read().await;
        Ok(courses.iter().map(|c| c.course.title.clone()).collect())
    }

    async fn clear(&self) -> Result<()> {
        self.courses.write().await.clear();
        self.chunks.write().await.clear();
        Ok(())
    }
}
