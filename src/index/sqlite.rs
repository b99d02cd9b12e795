//! SQLite-based course index implementation.
//!
//! Embeddings are stored as little-endian f32 blobs and compared in Rust.

use super::{
    course_not_found, match_title_text, nearest_title, rank_chunks, Course, CourseChunk,
    CourseIndex, CourseOutline, Lesson, SearchResults,
};
use crate::embedding::Embedder;
use crate::error::{LektorError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    title TEXT PRIMARY KEY,
    course_link TEXT,
    instructor TEXT,
    lessons_json TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    course_title TEXT NOT NULL,
    lesson_number INTEGER,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_course ON chunks(course_title, lesson_number);
"#;

/// SQLite-based course index.
pub struct SqliteCourseIndex {
    conn: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
}

impl SqliteCourseIndex {
    /// Open (or create) a course index at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, embedder: Arc<dyn Embedder>, max_results: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite course index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            max_results,
        })
    }

    /// Create an in-memory SQLite course index (useful for testing).
    pub fn in_memory(embedder: Arc<dyn Embedder>, max_results: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            max_results,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LektorError::Index(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn load_catalog(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT title, embedding FROM courses ORDER BY indexed_at")?;
        let rows = stmt.query_map([], |row| {
            let embedding: Vec<u8> = row.get(1)?;
            Ok((row.get::<_, String>(0)?, Self::bytes_to_embedding(&embedding)))
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn load_course(&self, title: &str) -> Result<Option<Course>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT title, course_link, instructor, lessons_json FROM courses WHERE title = ?1",
                params![title],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((title, course_link, instructor, lessons_json)) => {
                let lessons: Vec<Lesson> = serde_json::from_str(&lessons_json)?;
                Ok(Some(Course {
                    title,
                    course_link,
                    instructor,
                    lessons,
                }))
            }
            None => Ok(None),
        }
    }

    fn load_chunks(
        &self,
        course_title: Option<&str>,
        lesson_number: Option<i64>,
    ) -> Result<Vec<(CourseChunk, Vec<f32>)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT course_title, lesson_number, chunk_index, content, embedding
            FROM chunks
            WHERE (?1 IS NULL OR course_title = ?1)
              AND (?2 IS NULL OR lesson_number = ?2)
            "#,
        )?;

        let rows = stmt.query_map(params![course_title, lesson_number], |row| {
            let embedding: Vec<u8> = row.get(4)?;
            let chunk_index: i64 = row.get(2)?;
            Ok((
                CourseChunk {
                    course_title: row.get(0)?,
                    lesson_number: row.get(1)?,
                    chunk_index: chunk_index.max(0) as usize,
                    content: row.get(3)?,
                },
                Self::bytes_to_embedding(&embedding),
            ))
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn resolve_course(&self, name: &str) -> Result<Option<String>> {
        let catalog = self.load_catalog()?;
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
impl CourseIndex for SqliteCourseIndex {
    #[instrument(skip(self))]
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
        let candidates = self.load_chunks(course_title.as_deref(), lesson_number)?;
        let results = rank_chunks(&query_embedding, candidates, self.max_results);

        debug!("Found {} matching chunks", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn get_lesson_link(&self, course_title: &str, lesson_number: i64) -> Result<Option<String>> {
        Ok(self.load_course(course_title)?.and_then(|course| {
            course
                .lessons
                .into_iter()
                .find(|l| l.lesson_number == lesson_number)
                .and_then(|l| l.lesson_link)
        }))
    }

    #[instrument(skip(self))]
    async fn get_course_outline(&self, course_title: &str) -> Result<Option<CourseOutline>> {
        let Some(title) = self.resolve_course(course_title).await? else {
            return Ok(None);
        };
        Ok(self.load_course(&title)?.as_ref().map(CourseOutline::from))
    }

    #[instrument(skip(self, course, chunks), fields(course = %course.title, chunks = chunks.len()))]
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

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM chunks WHERE course_title = ?1", params![course.title])?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO courses
            (title, course_link, instructor, lessons_json, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                course.title,
                course.course_link,
                course.instructor,
                serde_json::to_string(&course.lessons)?,
                Self::embedding_to_bytes(&title_embedding),
                Utc::now().to_rfc3339(),
            ],
        )?;

        for (chunk, embedding) in chunks.iter().zip(&embeddings) {
            tx.execute(
                r#"
                INSERT INTO chunks
                (id, course_title, lesson_number, chunk_index, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    uuid::Uuid::new_v4().to_string(),
                    chunk.course_title,
                    chunk.lesson_number,
                    chunk.chunk_index as i64,
                    chunk.content,
                    Self::embedding_to_bytes(embedding),
                ],
            )?;
        }

        tx.commit()?;
        info!("Indexed course '{}' with {} chunks", course.title, chunks.len());
        Ok(chunks.len())
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        Ok(self.load_catalog()?.into_iter().map(|(title, _)| title).collect())
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM chunks; DELETE FROM courses;")?;
        info!("Cleared course index");
        Ok(())
    }
}
