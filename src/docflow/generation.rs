// SPDX-License-Identifier: MIT

//! Answer generation
//!
//! Collaborator that turns a merged [`QueryState`] into a final answer. It
//! receives whatever fields are present and builds its instruction
//! accordingly; the workflow engine never calls it - the caller composes
//! engine then generator.

use crate::docflow::workflow::state::QueryState;
use crate::llm::{InferenceError, InferenceService};
use once_cell::sync::Lazy;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct AnswerPayload {
    /// The generated answer to the user's query
    answer: String,
}

static BASE_PROMPT: &str = "You are a helpful AI assistant that answers questions based on the \
     provided context and conversation history. Your goal is to provide accurate, clear, and \
     helpful responses.";

static ANSWER_SCHEMA_NOTE: Lazy<String> = Lazy::new(|| {
    let schema = schema_for!(AnswerPayload);
    format!(
        "Respond with a single JSON object matching this schema:\n{}",
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    )
});

/// Generates the final answer through the inference collaborator
pub struct ResponseGenerator {
    inference: Arc<dyn InferenceService>,
}

impl ResponseGenerator {
    pub fn new(inference: Arc<dyn InferenceService>) -> Self {
        Self { inference }
    }

    /// Generate an answer for the merged state.
    ///
    /// Uses exactly the context fields that are present; a missing or empty
    /// field simply narrows the instruction.
    pub async fn generate(&self, state: &QueryState) -> Result<String, InferenceError> {
        let instruction = format!(
            "{}\n\n{}",
            system_prompt(state),
            ANSWER_SCHEMA_NOTE.as_str()
        );
        let input = render_input(state);

        let value = self.inference.infer(&instruction, &input).await?;
        let payload: AnswerPayload = serde_json::from_value(value)
            .map_err(|e| InferenceError::invalid(format!("answer did not match schema: {}", e)))?;

        Ok(payload.answer)
    }
}

fn has_text(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Pick the instruction variant matching the fields that are present.
fn system_prompt(state: &QueryState) -> String {
    let has_context = has_text(&state.document_context);
    let has_memory = has_text(&state.memory_context);

    match (has_context, has_memory) {
        (true, true) => format!(
            "{}\n\nYou have access to both retrieved context from the knowledge base and \
             previous conversation history. Use both sources to provide a comprehensive answer. \
             If the user's query refers to previous conversation, reference it appropriately.",
            BASE_PROMPT
        ),
        (true, false) => format!(
            "{}\n\nYou have access to retrieved context from the knowledge base. Use this \
             context to answer the user's query accurately. If the context is relevant, base \
             your answer on it. If not, provide a general helpful response.",
            BASE_PROMPT
        ),
        (false, true) => format!(
            "{}\n\nYou have access to previous conversation history. Use this history to \
             provide context-aware responses. If the user's query refers to previous \
             conversation, reference it appropriately.",
            BASE_PROMPT
        ),
        (false, false) => format!(
            "{}\n\nAnswer the user's query to the best of your ability based on your general \
             knowledge.",
            BASE_PROMPT
        ),
    }
}

/// Assemble the user-side input from the fields that are present.
fn render_input(state: &QueryState) -> String {
    let mut sections = Vec::new();

    if let Some(context) = state.document_context.as_deref() {
        if !context.trim().is_empty() {
            sections.push(format!("Context from knowledge base:\n{}", context));
        }
    }
    if let Some(memory) = state.memory_context.as_deref() {
        if !memory.trim().is_empty() {
            sections.push(format!("Previous conversation history:\n{}", memory));
        }
    }
    sections.push(format!("User query: {}", state.normalized_query));

    sections.join("\n\n")
}
