// SPDX-License-Identifier: MIT

//! Workflow engine
//!
//! Owns the query state machine: normalize, classify, route, dispatch the
//! retrieval branches, merge. The flow is a DAG - no state is revisited and
//! branches never feed each other.
//!
//! Merging is message-passing: each branch returns its value and the engine
//! writes the two disjoint state fields itself, so concurrent branches never
//! touch the state record.

use crate::docflow::classifier::IntentClassifier;
use crate::docflow::config::DocflowConfig;
use crate::docflow::error::{BranchFailure, BranchKind, DocflowError, RetrievalError};
use crate::docflow::normalizer::normalize;
use crate::docflow::retrieval::{ContextStore, MemoryStore};
use crate::docflow::workflow::routing::Route;
use crate::docflow::workflow::state::{QueryState, SessionContext, Stage};
use futures::future;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time;

type BranchOutcome = Result<String, BranchFailure>;

/// Orchestrates one query through the workflow DAG
pub struct WorkflowEngine {
    classifier: IntentClassifier,
    memory: Arc<dyn MemoryStore>,
    context: Arc<dyn ContextStore>,
    retrieval_timeout: Duration,
    combined_deadline: Option<Duration>,
}

impl WorkflowEngine {
    pub fn new(
        classifier: IntentClassifier,
        memory: Arc<dyn MemoryStore>,
        context: Arc<dyn ContextStore>,
        config: &DocflowConfig,
    ) -> Self {
        Self {
            classifier,
            memory,
            context,
            retrieval_timeout: config.retrieval_timeout(),
            combined_deadline: config.combined_deadline(),
        }
    }

    /// Run one query through the workflow.
    ///
    /// Returns the merged [`QueryState`] with stage `Done`, or the single
    /// fatal error that aborted it. Branch failures do not abort: they are
    /// recorded on the state and the matching context field stays absent.
    pub async fn run_workflow(
        &self,
        raw_query: &str,
        session: SessionContext,
    ) -> Result<QueryState, DocflowError> {
        self.execute(raw_query, session).await
    }

    /// Run one query, aborting with [`DocflowError::Cancelled`] if `cancel`
    /// completes first. In-flight branches are dropped with the execution;
    /// no partial state is surfaced.
    pub async fn run_until<F>(
        &self,
        raw_query: &str,
        session: SessionContext,
        cancel: F,
    ) -> Result<QueryState, DocflowError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.execute(raw_query, session) => result,
            _ = cancel => {
                log::warn!("workflow cancelled mid-flight, partial state discarded");
                Err(DocflowError::Cancelled)
            }
        }
    }

    async fn execute(
        &self,
        raw_query: &str,
        session: SessionContext,
    ) -> Result<QueryState, DocflowError> {
        let mut state = QueryState::new(raw_query);

        // Start -> Normalized
        state.normalized_query = normalize(raw_query);
        if state.normalized_query.is_empty() {
            state.stage = Stage::Failed;
            return Err(DocflowError::EmptyQuery);
        }
        state.stage = Stage::Normalized;

        // Normalized -> Classified
        let flags = match self.classifier.classify(&state.normalized_query).await {
            Ok(flags) => flags,
            Err(e) => {
                state.stage = Stage::Failed;
                return Err(e);
            }
        };
        state.requires_rag = flags.requires_rag;
        state.requires_memory = flags.requires_memory;
        state.stage = Stage::Classified;

        // Classified -> Routing: pure decision, no I/O
        let route = Route::decide(&flags);
        log::info!("execution {}: routed to {:?}", state.execution_id, route);

        // Routing -> Retrieving -> Merged
        match route {
            Route::NoRetrieval => {}
            Route::MemoryOnly => {
                state.stage = Stage::Retrieving;
                let outcome = Self::run_memory(
                    Arc::clone(&self.memory),
                    session.session_id.clone(),
                    state.normalized_query.clone(),
                    self.retrieval_timeout,
                )
                .await;
                Self::merge_memory(&mut state, outcome);
            }
            Route::ContextOnly => {
                state.stage = Stage::Retrieving;
                let outcome = Self::run_context(
                    Arc::clone(&self.context),
                    state.normalized_query.clone(),
                    self.retrieval_timeout,
                )
                .await;
                Self::merge_context(&mut state, outcome);
            }
            Route::Both => {
                state.stage = Stage::Retrieving;
                let (memory_outcome, context_outcome) =
                    self.fan_out(&session, &state.normalized_query).await;
                Self::merge_memory(&mut state, memory_outcome);
                Self::merge_context(&mut state, context_outcome);
            }
        }
        state.stage = Stage::Merged;

        // Merged -> Done: the caller hands the state to response generation.
        log::debug!(
            "execution {}: merged (memory={}, context={}, failures={})",
            state.execution_id,
            state.memory_context.is_some(),
            state.document_context.is_some(),
            state.branch_failures.len()
        );
        state.stage = Stage::Done;
        Ok(state)
    }

    /// Dispatch both branches, then join.
    ///
    /// Both tasks are spawned before either is awaited, so neither branch
    /// waits on the other. Per-branch timeouts run inside each task; the
    /// optional combined deadline additionally bounds the join, aborting
    /// whatever has not finished while keeping results that already have.
    async fn fan_out(
        &self,
        session: &SessionContext,
        normalized_query: &str,
    ) -> (BranchOutcome, BranchOutcome) {
        let mut memory_handle = tokio::spawn(Self::run_memory(
            Arc::clone(&self.memory),
            session.session_id.clone(),
            normalized_query.to_string(),
            self.retrieval_timeout,
        ));
        let mut context_handle = tokio::spawn(Self::run_context(
            Arc::clone(&self.context),
            normalized_query.to_string(),
            self.retrieval_timeout,
        ));

        let Some(budget) = self.combined_deadline else {
            let (memory_joined, context_joined) =
                future::join(memory_handle, context_handle).await;
            return (
                Self::join_outcome(BranchKind::Memory, memory_joined),
                Self::join_outcome(BranchKind::Context, context_joined),
            );
        };

        let deadline = time::sleep(budget);
        tokio::pin!(deadline);

        let mut memory_outcome: Option<BranchOutcome> = None;
        let mut context_outcome: Option<BranchOutcome> = None;

        while memory_outcome.is_none() || context_outcome.is_none() {
            tokio::select! {
                joined = &mut memory_handle, if memory_outcome.is_none() => {
                    memory_outcome = Some(Self::join_outcome(BranchKind::Memory, joined));
                }
                joined = &mut context_handle, if context_outcome.is_none() => {
                    context_outcome = Some(Self::join_outcome(BranchKind::Context, joined));
                }
                _ = &mut deadline => {
                    log::warn!("combined retrieval deadline of {}ms exceeded", budget.as_millis());
                    if memory_outcome.is_none() {
                        memory_handle.abort();
                        memory_outcome =
                            Some(Err(BranchFailure::timeout(BranchKind::Memory, budget)));
                    }
                    if context_outcome.is_none() {
                        context_handle.abort();
                        context_outcome =
                            Some(Err(BranchFailure::timeout(BranchKind::Context, budget)));
                    }
                }
            }
        }

        (
            memory_outcome.unwrap_or_else(|| Err(BranchFailure::timeout(BranchKind::Memory, budget))),
            context_outcome
                .unwrap_or_else(|| Err(BranchFailure::timeout(BranchKind::Context, budget))),
        )
    }

    async fn run_memory(
        store: Arc<dyn MemoryStore>,
        session_id: Option<String>,
        normalized_query: String,
        budget: Duration,
    ) -> BranchOutcome {
        let Some(session_id) = session_id else {
            return Err(BranchFailure::upstream(
                BranchKind::Memory,
                RetrievalError::MissingSession,
            ));
        };

        match time::timeout(budget, store.fetch_memory(&session_id, &normalized_query)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(BranchFailure::upstream(BranchKind::Memory, e)),
            Err(_) => Err(BranchFailure::timeout(BranchKind::Memory, budget)),
        }
    }

    async fn run_context(
        store: Arc<dyn ContextStore>,
        normalized_query: String,
        budget: Duration,
    ) -> BranchOutcome {
        match time::timeout(budget, store.fetch_context(&normalized_query)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(BranchFailure::upstream(BranchKind::Context, e)),
            Err(_) => Err(BranchFailure::timeout(BranchKind::Context, budget)),
        }
    }

    fn join_outcome(
        branch: BranchKind,
        joined: Result<BranchOutcome, JoinError>,
    ) -> BranchOutcome {
        match joined {
            Ok(outcome) => outcome,
            Err(e) => Err(BranchFailure::upstream(branch, e)),
        }
    }

    fn merge_memory(state: &mut QueryState, outcome: BranchOutcome) {
        match outcome {
            Ok(text) => state.memory_context = Some(text),
            Err(failure) => {
                log::warn!(
                    "execution {}: memory branch failed: {}",
                    state.execution_id,
                    failure.message
                );
                state.record_failure(failure);
            }
        }
    }

    fn merge_context(state: &mut QueryState, outcome: BranchOutcome) {
        match outcome {
            Ok(text) => state.document_context = Some(text),
            Err(failure) => {
                log::warn!(
                    "execution {}: context branch failed: {}",
                    state.execution_id,
                    failure.message
                );
                state.record_failure(failure);
            }
        }
    }
}
