//! Configuration module for Lektor.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AssistantPrompts, Prompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, IndexSettings, IngestSettings, ModelProvider,
    ModelSettings, PromptSettings, ServerSettings, SessionSettings, Settings,
};
