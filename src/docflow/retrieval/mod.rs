// SPDX-License-Identifier: MIT

//! Retrieval branches - the two independently dispatchable lookups
//!
//! Each branch wraps a single external collaborator behind a narrow async
//! trait. Branches never see each other's state; each receives only the
//! normalized query (plus a session id for memory lookups).

pub mod http;

pub use http::{HttpContextStore, HttpMemoryStore};

use crate::docflow::error::RetrievalError;
use async_trait::async_trait;

/// Conversation-memory collaborator
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Fetch prior-conversation context for a session.
    async fn fetch_memory(
        &self,
        session_id: &str,
        normalized_query: &str,
    ) -> Result<String, RetrievalError>;
}

/// Document-context collaborator
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Fetch document context relevant to the query.
    async fn fetch_context(&self, normalized_query: &str) -> Result<String, RetrievalError>;
}
