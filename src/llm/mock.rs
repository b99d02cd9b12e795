//! A scripted model for exercising the orchestrator without network access.

use super::types::{ModelRequest, ModelResponse};
use super::ChatModel;
use crate::error::{LektorError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Returns pre-configured responses in order and records every request.
///
/// Once the script runs out, an empty end-of-turn response is returned.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    /// Create a model that replays `responses` in sequence.
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of completions requested so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.requests
            .lock()
            .map_err(|e| LektorError::Model(format!("Failed to acquire lock: {}", e)))?
            .push(request.clone());

        let next = self
            .responses
            .lock()
            .map_err(|e| LektorError::Model(format!("Failed to acquire lock: {}", e)))?
            .pop_front();

        Ok(next.unwrap_or_else(|| ModelResponse::text("")))
    }
}
