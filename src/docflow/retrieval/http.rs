// SPDX-License-Identifier: MIT

//! HTTP-backed retrieval collaborators
//!
//! Thin clients for the conversation-memory service and the document-context
//! service. Both return plain text blocks ready to hand to generation.

use super::{ContextStore, MemoryStore};
use crate::docflow::error::RetrievalError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

const MEMORY_SERVICE: &str = "memory-service";
const CONTEXT_SERVICE: &str = "context-service";

/// How many past exchanges a memory lookup asks for
const MEMORY_LIMIT: u32 = 3;

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_query: String,
    pub assistant_response: String,
}

#[derive(Debug, Deserialize)]
struct MemoryResponse {
    conversations: Vec<ConversationTurn>,
}

#[derive(Debug, Deserialize)]
struct ContextMatch {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ContextResponse {
    matches: Vec<ContextMatch>,
}

/// Conversation-memory service client
pub struct HttpMemoryStore {
    client: Client,
    base_url: Url,
}

impl HttpMemoryStore {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Flatten the returned exchanges into a single readable block,
    /// most recent last.
    fn render_conversations(body: &Value) -> Result<String, RetrievalError> {
        let response: MemoryResponse = serde_json::from_value(body.clone())
            .map_err(|e| RetrievalError::invalid(MEMORY_SERVICE, e.to_string()))?;

        let rendered: Vec<String> = response
            .conversations
            .iter()
            .map(|turn| format!("User: {}\nAssistant: {}", turn.user_query, turn.assistant_response))
            .collect();

        Ok(rendered.join("\n\n"))
    }
}

#[async_trait]
impl MemoryStore for HttpMemoryStore {
    async fn fetch_memory(
        &self,
        session_id: &str,
        normalized_query: &str,
    ) -> Result<String, RetrievalError> {
        let url = self
            .base_url
            .join("memory/search")
            .map_err(|e| RetrievalError::invalid(MEMORY_SERVICE, e.to_string()))?;

        let resp = self
            .client
            .post(url)
            .json(&json!({
                "session_id": session_id,
                "query": normalized_query,
                "limit": MEMORY_LIMIT
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(RetrievalError::api(MEMORY_SERVICE, text));
        }

        let body: Value = resp.json().await?;
        Self::render_conversations(&body)
    }
}

/// Document-context service client
pub struct HttpContextStore {
    client: Client,
    base_url: Url,
    top_k: u32,
}

impl HttpContextStore {
    pub fn new(base_url: Url, top_k: u32) -> Self {
        Self {
            client: Client::new(),
            base_url,
            top_k,
        }
    }

    /// Concatenate the matched chunks into one context block.
    fn render_matches(body: &Value) -> Result<String, RetrievalError> {
        let response: ContextResponse = serde_json::from_value(body.clone())
            .map_err(|e| RetrievalError::invalid(CONTEXT_SERVICE, e.to_string()))?;

        let chunks: Vec<String> = response.matches.into_iter().map(|m| m.text).collect();
        Ok(chunks.join("\n\n"))
    }
}

#[async_trait]
impl ContextStore for HttpContextStore {
    async fn fetch_context(&self, normalized_query: &str) -> Result<String, RetrievalError> {
        let url = self
            .base_url
            .join("context/search")
            .map_err(|e| RetrievalError::invalid(CONTEXT_SERVICE, e.to_string()))?;

        let resp = self
            .client
            .post(url)
            .json(&json!({
                "query": normalized_query,
                "top_k": self.top_k
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(RetrievalError::api(CONTEXT_SERVICE, text));
        }

        let body: Value = resp.json().await?;
        Self::render_matches(&body)
    }
}
