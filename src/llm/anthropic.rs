//! Anthropic Messages API backend.

use super::types::{ContentBlock, ModelRequest, ModelResponse, StopReason};
use super::ChatModel;
use crate::error::{LektorError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default timeout for Anthropic API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub struct AnthropicModel {
    client: Client,
    host: String,
    api_key: String,
    model: String,
}

impl AnthropicModel {
    pub fn new(host: &str, api_key: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn build_payload(&self, request: &ModelRequest) -> Result<Value> {
        let mut payload = json!({
            "model": self.model,
            "system": request.system,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        if let Some(obj) = payload.as_object_mut() {
            if let Some(tools) = &request.tools {
                obj.insert("tools".to_string(), serde_json::to_value(tools)?);
            }
            if let Some(choice) = &request.tool_choice {
                obj.insert("tool_choice".to_string(), serde_json::to_value(choice)?);
            }
        }

        Ok(payload)
    }

    fn parse_response(body: Value) -> Result<ModelResponse> {
        let stop_reason = body
            .get("stop_reason")
            .and_then(Value::as_str)
            .map(StopReason::parse)
            .unwrap_or(StopReason::EndTurn);

        let blocks = body
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| LektorError::Model("Invalid response format from Anthropic API".to_string()))?;

        let mut content = Vec::with_capacity(blocks.len());
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") | Some("tool_use") => {
                    content.push(serde_json::from_value::<ContentBlock>(block.clone())?);
                }
                other => debug!("Skipping unsupported content block type {:?}", other),
            }
        }

        Ok(ModelResponse { stop_reason, content })
    }
}

#[async_trait]
impl ChatModel for AnthropicModel {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let payload = self.build_payload(request)?;
        let url = format!("{}/v1/messages", self.host);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: Value = response.json().await?;
                let parsed = Self::parse_response(body)?;
                debug!("Anthropic stop reason: {:?}", parsed.stop_reason);
                Ok(parsed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(LektorError::Model(format!(
                    "Anthropic request failed: {} - {}",
                    status, error_text
                )))
            }
        }
    }
}
