// SPDX-License-Identifier: MIT

//! Runtime configuration
//!
//! Loaded from a YAML file once at process start (or built directly in
//! tests) and passed down by value - the core holds no global config state.

use crate::docflow::error::DocflowError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

fn default_classifier_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o".to_string()
}

fn default_retrieval_timeout_ms() -> u64 {
    2_000
}

fn default_top_k() -> u32 {
    5
}

fn default_service_url() -> String {
    "http://localhost:9000/".to_string()
}

/// Configuration surface consumed by the core
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocflowConfig {
    /// Model backing intent classification
    #[serde(default = "default_classifier_model")]
    pub classifier_model: String,
    /// Model backing answer generation
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    /// Per-branch retrieval timeout in milliseconds
    #[serde(default = "default_retrieval_timeout_ms")]
    pub retrieval_timeout_ms: u64,
    /// Optional overall budget for concurrently dispatched branches
    #[serde(default)]
    pub combined_deadline_ms: Option<u64>,
    /// Conversation-memory service base URL
    #[serde(default = "default_service_url")]
    pub memory_service_url: String,
    /// Document-context service base URL
    #[serde(default = "default_service_url")]
    pub context_service_url: String,
    /// Document chunks requested per context lookup
    #[serde(default = "default_top_k")]
    pub context_top_k: u32,
}

impl Default for DocflowConfig {
    fn default() -> Self {
        Self {
            classifier_model: default_classifier_model(),
            generation_model: default_generation_model(),
            retrieval_timeout_ms: default_retrieval_timeout_ms(),
            combined_deadline_ms: None,
            memory_service_url: default_service_url(),
            context_service_url: default_service_url(),
            context_top_k: default_top_k(),
        }
    }
}

impl DocflowConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DocflowError> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self, DocflowError> {
        let config: DocflowConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_millis(self.retrieval_timeout_ms)
    }

    pub fn combined_deadline(&self) -> Option<Duration> {
        self.combined_deadline_ms.map(Duration::from_millis)
    }

    /// Parsed conversation-memory service endpoint
    pub fn memory_service(&self) -> Result<Url, DocflowError> {
        Url::parse(&self.memory_service_url)
            .map_err(|e| DocflowError::config(format!("bad memory_service_url: {}", e)))
    }

    /// Parsed document-context service endpoint
    pub fn context_service(&self) -> Result<Url, DocflowError> {
        Url::parse(&self.context_service_url)
            .map_err(|e| DocflowError::config(format!("bad context_service_url: {}", e)))
    }
}
