//! Courses command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::index::open_index;
use anyhow::Result;
use std::sync::Arc;

/// List indexed courses.
pub async fn run_courses(settings: Settings) -> Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding));
    let index = open_index(&settings, embedder)?;
    let titles = index.course_titles().await?;

    if titles.is_empty() {
        Output::info("No courses indexed yet. Run 'lektor ingest <dir>' to add some.");
        return Ok(());
    }

    Output::header(&format!("Indexed courses ({})", titles.len()));
    for title in &titles {
        if let Some(outline) = index.get_course_outline(title).await? {
            Output::list_item(&format!("{} ({} lessons)", outline.title, outline.lessons.len()));
            if let Some(link) = &outline.course_link {
                println!("    {}", link);
            }
        }
    }

    Ok(())
}
