// SPDX-License-Identifier: MIT

//! Routing decision
//!
//! Pure mapping from classifier flags to the set of retrieval branches to
//! execute. No I/O happens here.

use crate::docflow::classifier::IntentFlags;

/// Which retrieval branches one routing decision dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Neither flag set: go straight to merge, both context fields stay absent
    NoRetrieval,
    /// Only the conversation-memory branch runs
    MemoryOnly,
    /// Only the document-context branch runs
    ContextOnly,
    /// Both branches run, dispatched concurrently and joined
    Both,
}

impl Route {
    /// Evaluate the `(requires_memory, requires_rag)` pair.
    pub fn decide(flags: &IntentFlags) -> Self {
        match (flags.requires_memory, flags.requires_rag) {
            (false, false) => Route::NoRetrieval,
            (true, false) => Route::MemoryOnly,
            (false, true) => Route::ContextOnly,
            (true, true) => Route::Both,
        }
    }

    pub fn wants_memory(&self) -> bool {
        matches!(self, Route::MemoryOnly | Route::Both)
    }

    pub fn wants_context(&self) -> bool {
        matches!(self, Route::ContextOnly | Route::Both)
    }
}
