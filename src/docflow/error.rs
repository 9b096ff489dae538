// SPDX-License-Identifier: MIT

//! Typed error handling for docflow-rs
//!
//! The workflow aborts only on [`DocflowError`]; a retrieval-branch failure
//! is absorbed into the query state as a [`BranchFailure`] record instead.

use crate::llm::InferenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for docflow-rs
#[derive(Debug, Error)]
pub enum DocflowError {
    /// Raw query missing or not a string; raised at the caller boundary,
    /// before the state machine is entered
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Normalization collapsed the query to nothing
    #[error("Query is empty after normalization")]
    EmptyQuery,

    /// The inference collaborator failed or returned unparseable flags;
    /// fatal for the request - routing must not guess
    #[error("Intent classification unavailable: {0}")]
    ClassificationUnavailable(#[source] InferenceError),

    /// Execution was cancelled mid-flight; in-flight branches were aborted
    /// and no partial state is surfaced
    #[error("Workflow cancelled")]
    Cancelled,

    /// Configuration errors (missing fields, bad endpoint URLs)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors while loading configuration
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl DocflowError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid-input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Errors from the retrieval collaborators
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The backing service returned a non-success status
    #[error("Retrieval API error from {service}: {message}")]
    Api { service: String, message: String },

    /// Transport-level failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The service answered with an unexpected body
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse { service: String, message: String },

    /// Memory lookup was routed without a session identifier
    #[error("Session identifier required for memory lookup")]
    MissingSession,
}

impl RetrievalError {
    /// Create an API error
    pub fn api(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-response error
    pub fn invalid(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// Which retrieval branch a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    Memory,
    Context,
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchKind::Memory => write!(f, "memory"),
            BranchKind::Context => write!(f, "context"),
        }
    }
}

/// A recorded, non-fatal retrieval-branch failure.
///
/// The workflow proceeds past it; the corresponding context field stays
/// absent and the record is surfaced to the caller alongside the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchFailure {
    pub branch: BranchKind,
    pub message: String,
    pub timed_out: bool,
    pub recorded_at: DateTime<Utc>,
}

impl BranchFailure {
    /// Record an upstream collaborator failure
    pub fn upstream(branch: BranchKind, err: impl fmt::Display) -> Self {
        Self {
            branch,
            message: err.to_string(),
            timed_out: false,
            recorded_at: Utc::now(),
        }
    }

    /// Record a branch that exceeded its time budget
    pub fn timeout(branch: BranchKind, after: Duration) -> Self {
        Self {
            branch,
            message: format!("timed out after {}ms", after.as_millis()),
            timed_out: true,
            recorded_at: Utc::now(),
        }
    }
}
