// SPDX-License-Identifier: MIT

//! docflow-rs - query-processing orchestrator for a document QA assistant
//!
//! The crate is split in two:
//! - [`llm`] - the narrow interface to the external inference service
//! - [`docflow`] - normalization, intent classification, retrieval branches
//!   and the workflow engine that routes a query through them

pub mod docflow;
pub mod llm;
