//! Error types for Lektor.

use thiserror::Error;

/// Library-level error type for Lektor operations.
#[derive(Error, Debug)]
pub enum LektorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Course index error: {0}")]
    Index(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Ingestion failed: {0}")]
    Ingest(String),

    #[error("Invalid tool arguments for '{tool}': {message}")]
    ToolArguments { tool: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),
}

/// Result type alias for Lektor operations.
pub type Result<T> = std::result::Result<T, LektorError>;
