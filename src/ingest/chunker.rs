//! Sentence-aligned text chunking.

use crate::config::IngestSettings;
use crate::error::{LektorError, Result};
use regex::Regex;

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk. A single longer sentence still forms
    /// its own chunk.
    pub chunk_size: usize,
    /// Characters of trailing sentences repeated at the start of the next chunk.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

impl From<&IngestSettings> for ChunkingConfig {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }
}

/// Splits text into overlapping chunks on sentence boundaries.
pub struct SentenceChunker {
    sentence_end: Regex,
    config: ChunkingConfig,
}

impl SentenceChunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        let sentence_end = Regex::new(r#"[.!?]+["')\]]*\s+"#)
            .map_err(|e| LektorError::Ingest(format!("Invalid pattern: {}", e)))?;
        Ok(Self { sentence_end, config })
    }

    /// Split text into sentences, collapsing internal whitespace.
    pub fn sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for m in self.sentence_end.find_iter(text) {
            let end = m.start() + m.as_str().trim_end().len();
            push_sentence(&mut sentences, &text[start..end]);
            start = m.end();
        }
        push_sentence(&mut sentences, &text[start..]);

        sentences
    }

    /// Chunk `text`.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let sentences = self.sentences(text);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < sentences.len() {
            let mut end = start;
            let mut size = 0;
            while end < sentences.len() {
                let added = sentences[end].len() + usize::from(end > start);
                if end > start && size + added > self.config.chunk_size {
                    break;
                }
                size += added;
                end += 1;
            }

            chunks.push(sentences[start..end].join(" "));
            if end >= sentences.len() {
                break;
            }

            // Walk back over trailing sentences that fit in the overlap.
            let mut overlap = 0;
            let mut carried = 0;
            for sentence in sentences[start..end].iter().rev() {
                let added = sentence.len() + usize::from(carried > 0);
                if overlap + added > self.config.chunk_overlap {
                    break;
                }
                overlap += added;
                carried += 1;
            }

            let next = end - carried;
            start = if next > start { next } else { end };
        }

        chunks
    }
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let sentence = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
}
