//! Generative model providers.
//!
//! The orchestrator talks to models through the [`ChatModel`] trait using the
//! provider-neutral types in [`types`].

mod anthropic;
pub mod mock;
mod openai;
pub mod types;

pub use anthropic::AnthropicModel;
pub use openai::OpenAIModel;
pub use types::{
    ContentBlock, Message, ModelRequest, ModelResponse, Role, StopReason, ToolChoice, ToolSchema,
};

use crate::config::{ModelProvider, Settings};
use crate::error::{LektorError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for generative model backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse>;
}

/// Build the configured model backend.
pub fn create_model(settings: &Settings) -> Result<Arc<dyn ChatModel>> {
    match settings.model.provider {
        ModelProvider::Anthropic => {
            let api_key = settings.model.anthropic_key().ok_or_else(|| {
                LektorError::Config(
                    "Anthropic API key not set. Set ANTHROPIC_API_KEY or model.anthropic_api_key."
                        .to_string(),
                )
            })?;
            Ok(Arc::new(AnthropicModel::new(
                &settings.model.anthropic_host,
                &api_key,
                &settings.model.model,
            )?))
        }
        ModelProvider::OpenAI => Ok(Arc::new(OpenAIModel::new(&settings.model.model))),
    }
}
