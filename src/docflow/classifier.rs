// SPDX-License-Identifier: MIT

//! Intent classification
//!
//! Asks the inference collaborator which retrieval branches a query needs.
//! Routing correctness depends entirely on these flags, so any collaborator
//! failure is fatal for the request - the classifier never guesses.

use crate::docflow::error::DocflowError;
use crate::llm::{InferenceError, InferenceService};
use once_cell::sync::Lazy;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The two independent routing flags produced per query.
///
/// All four combinations are valid and each takes a distinct path through
/// the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IntentFlags {
    /// True when answering needs internal documents or domain-specific
    /// information that is not general public knowledge
    pub requires_rag: bool,
    /// True when correct handling depends on earlier turns of the same
    /// conversation (follow-up questions, pronoun resolution)
    pub requires_memory: bool,
}

static CLASSIFY_INSTRUCTION: Lazy<String> = Lazy::new(|| {
    let schema = schema_for!(IntentFlags);
    format!(
        "You classify a user query for a document question-answering assistant. \
         Decide two independent booleans.\n\
         - requires_rag: true when the query concerns internal documents or \
         domain-specific knowledge the assistant must look up, false for \
         general knowledge or chit-chat.\n\
         - requires_memory: true when the query depends on previous turns in \
         the same conversation, such as follow-up questions or pronouns like \
         'it' or 'that', false when it is self-contained.\n\
         Respond with a single JSON object matching this schema:\n{}",
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    )
});

/// Classifies queries into [`IntentFlags`] via the inference collaborator
pub struct IntentClassifier {
    inference: Arc<dyn InferenceService>,
}

impl IntentClassifier {
    pub fn new(inference: Arc<dyn InferenceService>) -> Self {
        Self { inference }
    }

    /// Classify a normalized query.
    ///
    /// Fails with [`DocflowError::ClassificationUnavailable`] when the
    /// collaborator errors or returns a result that does not match
    /// [`IntentFlags`].
    pub async fn classify(&self, normalized_query: &str) -> Result<IntentFlags, DocflowError> {
        let value = self
            .inference
            .infer(&CLASSIFY_INSTRUCTION, normalized_query)
            .await
            .map_err(DocflowError::ClassificationUnavailable)?;

        let flags: IntentFlags = serde_json::from_value(value).map_err(|e| {
            DocflowError::ClassificationUnavailable(InferenceError::invalid(format!(
                "flags did not match schema: {}",
                e
            )))
        })?;

        log::info!(
            "classified query: requires_rag={} requires_memory={}",
            flags.requires_rag,
            flags.requires_memory
        );

        Ok(flags)
    }
}
