// SPDX-License-Identifier: MIT

//! Inference module - narrow interface to the external inference service
//!
//! Everything in this crate talks to language models through
//! [`InferenceService`]: one instruction, one input, one structured JSON
//! result. Provider mechanics live in the implementations:
//! - [openai] - OpenAI-compatible chat completions API

pub mod openai;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Inference-specific errors
#[derive(Debug, Error)]
pub enum InferenceError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// The backing service returned a non-success status
    #[error("Inference API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Transport-level failure (connect, TLS, timeout)
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The service answered, but not with the structure we asked for
    #[error("Invalid response from inference service: {0}")]
    InvalidResponse(String),
}

impl InferenceError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-response error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}

/// Core trait for the external inference collaborator.
///
/// `instruction` is the natural-language task specification; `input` is the
/// text it applies to. Implementations must fail explicitly: a service error,
/// a timeout, or an unparseable body is an [`InferenceError`], never a
/// silently defaulted result.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn infer(&self, instruction: &str, input: &str) -> Result<Value, InferenceError>;
}
