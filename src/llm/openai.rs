// SPDX-License-Identifier: MIT

//! OpenAI-compatible inference client
//!
//! Sends one system instruction plus one user input to a chat-completions
//! endpoint and parses the reply as a single JSON object.

use super::{InferenceError, InferenceService};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;

const PROVIDER: &str = "OpenAI";

/// OpenAI-compatible [`InferenceService`] implementation
pub struct OpenAiInference {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAiInference {
    /// Create a new client for the given model.
    ///
    /// Requires `OPENAI_API_KEY` to be set. Optionally uses `OPENAI_BASE_URL`
    /// for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, InferenceError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| InferenceError::ApiKeyMissing(PROVIDER.to_string()))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    /// Extract the first choice's message content and parse it as JSON.
    fn parse_structured_response(response: &Value) -> Result<Value, InferenceError> {
        let content = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| InferenceError::invalid("missing choices[0].message.content"))?;

        serde_json::from_str(content)
            .map_err(|e| InferenceError::invalid(format!("content is not valid JSON: {}", e)))
    }
}

#[async_trait]
impl InferenceService for OpenAiInference {
    async fn infer(&self, instruction: &str, input: &str) -> Result<Value, InferenceError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = json!({
            "model": self.model_name,
            "messages": [
                { "role": "system", "content": instruction },
                { "role": "user", "content": input }
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.0
        });

        log::debug!(
            "OpenAI request for model {}: {}",
            self.model_name,
            serde_json::to_string(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(InferenceError::api(PROVIDER, text));
        }

        let resp_json: Value = resp.json().await?;
        Self::parse_structured_response(&resp_json)
    }
}
