//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::index::open_index;
use crate::ingest::{course_files, ingest_folder, ChunkingConfig};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Run the ingest command.
pub async fn run_ingest(dir: Option<PathBuf>, clear: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let dir = dir.unwrap_or_else(|| settings.docs_dir());
    let files = course_files(&dir)?;
    if files.is_empty() {
        Output::warning(&format!("No .txt or .md files in {}", dir.display()));
        return Ok(());
    }

    let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding));
    let index = open_index(&settings, embedder)?;

    let spinner = Output::spinner(&format!("Indexing {} documents...", files.len()));
    let result = ingest_folder(
        index.as_ref(),
        &dir,
        clear,
        &ChunkingConfig::from(&settings.ingest),
    )
    .await;
    spinner.finish_and_clear();

    let report = result?;
    Output::success(&format!(
        "Added {} courses ({} chunks)",
        report.courses_added, report.chunks_added
    ));
    if report.skipped > 0 {
        Output::info(&format!("{} courses were already indexed", report.skipped));
    }
    if report.failed > 0 {
        Output::warning(&format!(
            "{} files could not be read; run with -v for details",
            report.failed
        ));
    }

    Ok(())
}
