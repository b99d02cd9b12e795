//! Pre-flight checks before operations that call external APIs.
//!
//! Catches missing credentials up front instead of failing on the first
//! request.

use crate::config::{ModelProvider, Settings};
use crate::error::{LektorError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering questions needs the model key and the embeddings key.
    Ask,
    /// Ingestion only embeds.
    Ingest,
    /// Listing courses reads the local index.
    Courses,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ask => {
            check_model_key(settings)?;
            check_openai_key()?;
        }
        Operation::Ingest => {
            check_openai_key()?;
        }
        Operation::Courses => {}
    }
    Ok(())
}

fn check_model_key(settings: &Settings) -> Result<()> {
    match settings.model.provider {
        ModelProvider::Anthropic => match settings.model.anthropic_key() {
            Some(key) if !key.is_empty() => Ok(()),
            _ => Err(LektorError::Config(
                "ANTHROPIC_API_KEY not set. Set it with: export ANTHROPIC_API_KEY='sk-ant-...'"
                    .to_string(),
            )),
        },
        ModelProvider::OpenAI => check_openai_key(),
    }
}

/// Embeddings always go through OpenAI.
fn check_openai_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(LektorError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(LektorError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_courses_has_no_requirements() {
        assert!(check(Operation::Courses, &Settings::default()).is_ok());
    }

    #[test]
    fn test_configured_anthropic_key_passes() {
        let mut settings = Settings::default();
        settings.model.anthropic_api_key = Some("sk-ant-test".to_string());
        assert!(check_model_key(&settings).is_ok());
    }
}
