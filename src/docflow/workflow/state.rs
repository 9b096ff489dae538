// SPDX-License-Identifier: MIT

//! Workflow state
//!
//! One [`QueryState`] is created per incoming query, owned by that execution
//! for its whole lifetime, and never shared across queries.

use crate::docflow::error::{BranchFailure, BranchKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle stage of one workflow execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    Normalized,
    Classified,
    Retrieving,
    Merged,
    Done,
    Failed,
}

/// Per-request caller context carried into the workflow.
///
/// Branches receive only what they need from it; the memory branch reads the
/// session id, the context branch reads nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    /// Conversation identifier used for memory lookups
    pub session_id: Option<String>,
}

impl SessionContext {
    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
        }
    }
}

/// The single mutable record threaded through one workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryState {
    /// Unique id of this execution, for log correlation
    pub execution_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// As received; immutable once set
    pub raw_query: String,
    /// Canonical form used by all downstream steps
    pub normalized_query: String,
    pub requires_rag: bool,
    pub requires_memory: bool,
    /// Present iff the memory branch was routed and completed without error
    pub memory_context: Option<String>,
    /// Present iff the context branch was routed and completed without error
    pub document_context: Option<String>,
    /// Filled by the response-generation collaborator, not by the engine
    pub response: Option<String>,
    pub stage: Stage,
    /// Absorbed branch failures, surfaced as metadata for the caller
    pub branch_failures: Vec<BranchFailure>,
}

impl QueryState {
    pub fn new(raw_query: &str) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            started_at: Utc::now(),
            raw_query: raw_query.to_string(),
            normalized_query: String::new(),
            requires_rag: false,
            requires_memory: false,
            memory_context: None,
            document_context: None,
            response: None,
            stage: Stage::Start,
            branch_failures: Vec::new(),
        }
    }

    pub(crate) fn record_failure(&mut self, failure: BranchFailure) {
        self.branch_failures.push(failure);
    }

    /// Whether the given branch was routed but failed
    pub fn branch_failed(&self, branch: BranchKind) -> bool {
        self.branch_failures.iter().any(|f| f.branch == branch)
    }
}
