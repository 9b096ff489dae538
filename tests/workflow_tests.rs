//! Integration tests for the workflow engine
//!
//! These tests drive the engine end to end with instrumented mock
//! collaborators: routing coverage, parallel dispatch, merge disjointness,
//! failure propagation and cancellation.

use async_trait::async_trait;
use docflow_rs::docflow::classifier::IntentClassifier;
use docflow_rs::docflow::config::DocflowConfig;
use docflow_rs::docflow::error::{BranchKind, DocflowError, RetrievalError};
use docflow_rs::docflow::retrieval::{ContextStore, MemoryStore};
use docflow_rs::docflow::workflow::{SessionContext, Stage, WorkflowEngine};
use docflow_rs::llm::{InferenceError, InferenceService};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

// ============================================================================
// Mock Components
// ============================================================================

/// Mock inference service returning fixed flags, counting calls
struct FlagInference {
    result: Result<Value, String>,
    calls: AtomicUsize,
}

impl FlagInference {
    fn flags(requires_memory: bool, requires_rag: bool) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(json!({
                "requires_rag": requires_rag,
                "requires_memory": requires_memory
            })),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceService for FlagInference {
    async fn infer(&self, _instruction: &str, _input: &str) -> Result<Value, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(v) => Ok(v.clone()),
            Err(msg) => Err(InferenceError::api("mock", msg.clone())),
        }
    }
}

/// Instrumented memory store: counts calls, records dispatch time and the
/// session ids it was handed
struct MockMemory {
    response: Result<String, String>,
    delay: Duration,
    calls: AtomicUsize,
    dispatched_at: Mutex<Option<Instant>>,
    seen_sessions: Mutex<Vec<String>>,
}

impl MockMemory {
    fn new(response: Result<String, String>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            response,
            delay,
            calls: AtomicUsize::new(0),
            dispatched_at: Mutex::new(None),
            seen_sessions: Mutex::new(Vec::new()),
        })
    }

    fn ok(text: &str) -> Arc<Self> {
        Self::new(Ok(text.to_string()), Duration::ZERO)
    }

    fn ok_after(text: &str, delay: Duration) -> Arc<Self> {
        Self::new(Ok(text.to_string()), delay)
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn dispatched_at(&self) -> Option<Instant> {
        *self.dispatched_at.lock().unwrap()
    }
}

#[async_trait]
impl MemoryStore for MockMemory {
    async fn fetch_memory(
        &self,
        session_id: &str,
        _normalized_query: &str,
    ) -> Result<String, RetrievalError> {
        self.dispatched_at.lock().unwrap().get_or_insert(Instant::now());
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_sessions.lock().unwrap().push(session_id.to_string());

        tokio::time::sleep(self.delay).await;
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(msg) => Err(RetrievalError::api("mock-memory", msg.clone())),
        }
    }
}

/// Instrumented context store
struct MockContext {
    response: Result<String, String>,
    delay: Duration,
    calls: AtomicUsize,
    dispatched_at: Mutex<Option<Instant>>,
}

impl MockContext {
    fn new(response: Result<String, String>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            response,
            delay,
            calls: AtomicUsize::new(0),
            dispatched_at: Mutex::new(None),
        })
    }

    fn ok(text: &str) -> Arc<Self> {
        Self::new(Ok(text.to_string()), Duration::ZERO)
    }

    fn ok_after(text: &str, delay: Duration) -> Arc<Self> {
        Self::new(Ok(text.to_string()), delay)
    }

    fn failing(message: &str) -> Arc<Self> {
        Self::new(Err(message.to_string()), Duration::ZERO)
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn dispatched_at(&self) -> Option<Instant> {
        *self.dispatched_at.lock().unwrap()
    }
}

#[async_trait]
impl ContextStore for MockContext {
    async fn fetch_context(&self, _normalized_query: &str) -> Result<String, RetrievalError> {
        self.dispatched_at.lock().unwrap().get_or_insert(Instant::now());
        self.calls.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(msg) => Err(RetrievalError::api("mock-context", msg.clone())),
        }
    }
}

fn engine_with(
    inference: Arc<FlagInference>,
    memory: Arc<MockMemory>,
    context: Arc<MockContext>,
    config: &DocflowConfig,
) -> WorkflowEngine {
    WorkflowEngine::new(
        IntentClassifier::new(inference),
        memory,
        context,
        config,
    )
}

fn session() -> SessionContext {
    SessionContext::with_session("session-1")
}

// ============================================================================
// Routing Coverage
// ============================================================================

#[tokio::test]
async fn test_route_none_dispatches_no_branches() {
    let memory = MockMemory::ok("past");
    let context = MockContext::ok("docs");
    let engine = engine_with(
        FlagInference::flags(false, false),
        memory.clone(),
        context.clone(),
        &DocflowConfig::default(),
    );

    let state = engine.run_workflow("small talk", session()).await.unwrap();

    assert_eq!(memory.call_count(), 0);
    assert_eq!(context.call_count(), 0);
    assert!(state.memory_context.is_none());
    assert!(state.document_context.is_none());
    assert_eq!(state.stage, Stage::Done);
}

#[tokio::test]
async fn test_route_memory_only() {
    let memory = MockMemory::ok("past");
    let context = MockContext::ok("docs");
    let engine = engine_with(
        FlagInference::flags(true, false),
        memory.clone(),
        context.clone(),
        &DocflowConfig::default(),
    );

    let state = engine
        .run_workflow("what did I ask before?", session())
        .await
        .unwrap();

    assert_eq!(memory.call_count(), 1);
    assert_eq!(context.call_count(), 0);
    assert_eq!(state.memory_context.as_deref(), Some("past"));
    assert!(state.document_context.is_none());
}

#[tokio::test]
async fn test_route_context_only() {
    let memory = MockMemory::ok("past");
    let context = MockContext::ok("docs");
    let engine = engine_with(
        FlagInference::flags(false, true),
        memory.clone(),
        context.clone(),
        &DocflowConfig::default(),
    );

    let state = engine
        .run_workflow("what is the refund policy?", session())
        .await
        .unwrap();

    assert_eq!(memory.call_count(), 0);
    assert_eq!(context.call_count(), 1);
    assert!(state.memory_context.is_none());
    assert_eq!(state.document_context.as_deref(), Some("docs"));
}

#[tokio::test]
async fn test_route_both_calls_each_branch_once() {
    let memory = MockMemory::ok("past");
    let context = MockContext::ok("docs");
    let engine = engine_with(
        FlagInference::flags(true, true),
        memory.clone(),
        context.clone(),
        &DocflowConfig::default(),
    );

    let state = engine
        .run_workflow("what does the doc say about it?", session())
        .await
        .unwrap();

    assert_eq!(memory.call_count(), 1);
    assert_eq!(context.call_count(), 1);
    assert_eq!(state.memory_context.as_deref(), Some("past"));
    assert_eq!(state.document_context.as_deref(), Some("docs"));
}

// ============================================================================
// Parallel Dispatch (fan-out/fan-in)
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_both_branches_run_concurrently() {
    let delay = Duration::from_millis(100);
    let memory = MockMemory::ok_after("past", delay);
    let context = MockContext::ok_after("docs", delay);
    let engine = engine_with(
        FlagInference::flags(true, true),
        memory.clone(),
        context.clone(),
        &DocflowConfig::default(),
    );

    let started = Instant::now();
    let state = engine.run_workflow("needs both", session()).await.unwrap();
    let elapsed = started.elapsed();

    // Sequential execution would take ~200ms of virtual time.
    assert!(
        elapsed < Duration::from_millis(150),
        "branches did not overlap: {:?}",
        elapsed
    );

    // Dispatch of one branch does not wait on completion of the other.
    let memory_start = memory.dispatched_at().expect("memory never dispatched");
    let context_start = context.dispatched_at().expect("context never dispatched");
    let gap = if memory_start > context_start {
        memory_start - context_start
    } else {
        context_start - memory_start
    };
    assert!(gap < delay, "second branch waited on the first: {:?}", gap);

    assert_eq!(state.memory_context.as_deref(), Some("past"));
    assert_eq!(state.document_context.as_deref(), Some("docs"));
}

// ============================================================================
// Merge Disjointness & Branch Failure Tolerance
// ============================================================================

#[tokio::test]
async fn test_one_branch_failure_does_not_abort_the_workflow() {
    let memory = MockMemory::ok("past");
    let context = MockContext::failing("vector index offline");
    let engine = engine_with(
        FlagInference::flags(true, true),
        memory.clone(),
        context.clone(),
        &DocflowConfig::default(),
    );

    let state = engine.run_workflow("needs both", session()).await.unwrap();

    assert_eq!(state.stage, Stage::Done);
    assert_eq!(state.memory_context.as_deref(), Some("past"));
    assert!(state.document_context.is_none());
    assert!(state.branch_failed(BranchKind::Context));
    assert!(!state.branch_failed(BranchKind::Memory));

    let failure = &state.branch_failures[0];
    assert!(failure.message.contains("vector index offline"));
    assert!(!failure.timed_out);
}

#[tokio::test(start_paused = true)]
async fn test_branch_timeout_is_recorded_not_fatal() {
    let config = DocflowConfig {
        retrieval_timeout_ms: 50,
        ..DocflowConfig::default()
    };
    let memory = MockMemory::ok("past");
    let context = MockContext::ok_after("docs", Duration::from_millis(500));
    let engine = engine_with(
        FlagInference::flags(true, true),
        memory.clone(),
        context.clone(),
        &config,
    );

    let state = engine.run_workflow("needs both", session()).await.unwrap();

    assert_eq!(state.memory_context.as_deref(), Some("past"));
    assert!(state.document_context.is_none());
    assert!(state.branch_failed(BranchKind::Context));
    assert!(state.branch_failures[0].timed_out);
}

#[tokio::test(start_paused = true)]
async fn test_combined_deadline_keeps_finished_branch_results() {
    let config = DocflowConfig {
        combined_deadline_ms: Some(100),
        ..DocflowConfig::default()
    };
    let memory = MockMemory::ok_after("past", Duration::from_millis(10));
    let context = MockContext::ok_after("docs", Duration::from_millis(1_000));
    let engine = engine_with(
        FlagInference::flags(true, true),
        memory.clone(),
        context.clone(),
        &config,
    );

    let state = engine.run_workflow("needs both", session()).await.unwrap();

    // Memory finished inside the budget and is kept; context was aborted.
    assert_eq!(state.memory_context.as_deref(), Some("past"));
    assert!(state.document_context.is_none());
    assert!(state.branch_failed(BranchKind::Context));
    assert!(state.branch_failures[0].timed_out);
}

// ============================================================================
// Fatal Errors
// ============================================================================

#[tokio::test]
async fn test_classifier_failure_short_circuits_retrieval() {
    let memory = MockMemory::ok("past");
    let context = MockContext::ok("docs");
    let engine = engine_with(
        FlagInference::failing("inference down"),
        memory.clone(),
        context.clone(),
        &DocflowConfig::default(),
    );

    let err = engine.run_workflow("anything", session()).await.unwrap_err();

    assert!(matches!(err, DocflowError::ClassificationUnavailable(_)));
    assert_eq!(memory.call_count(), 0);
    assert_eq!(context.call_count(), 0);
}

#[tokio::test]
async fn test_empty_query_rejected_before_classification() {
    let inference = FlagInference::flags(true, true);
    let memory = MockMemory::ok("past");
    let context = MockContext::ok("docs");
    let engine = engine_with(
        inference.clone(),
        memory.clone(),
        context.clone(),
        &DocflowConfig::default(),
    );

    let err = engine.run_workflow("   \t\n  ", session()).await.unwrap_err();

    assert!(matches!(err, DocflowError::EmptyQuery));
    assert_eq!(inference.call_count(), 0);
    assert_eq!(memory.call_count(), 0);
    assert_eq!(context.call_count(), 0);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancellation_discards_partial_state() {
    let memory = MockMemory::ok_after("past", Duration::from_millis(1_000));
    let context = MockContext::ok_after("docs", Duration::from_millis(1_000));
    let engine = engine_with(
        FlagInference::flags(true, true),
        memory.clone(),
        context.clone(),
        &DocflowConfig::default(),
    );

    let err = engine
        .run_until(
            "needs both",
            session(),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DocflowError::Cancelled));
    // Branches were in flight when the request was cancelled.
    assert_eq!(memory.call_count(), 1);
    assert_eq!(context.call_count(), 1);
}

// ============================================================================
// Cross-Request Isolation
// ============================================================================

#[tokio::test]
async fn test_concurrent_workflows_do_not_cross_contaminate() {
    let engine = Arc::new(engine_with(
        FlagInference::flags(false, false),
        MockMemory::ok("past"),
        MockContext::ok("docs"),
        &DocflowConfig::default(),
    ));

    let runs = (0..16).map(|i| {
        let engine = Arc::clone(&engine);
        async move {
            let raw = format!("  Question NUMBER {}  please", i);
            let state = engine.run_workflow(&raw, SessionContext::default()).await.unwrap();
            (i, state)
        }
    });

    for (i, state) in join_all(runs).await {
        assert_eq!(
            state.normalized_query,
            format!("question number {} please", i)
        );
        assert_eq!(state.raw_query, format!("  Question NUMBER {}  please", i));
    }
}

#[tokio::test]
async fn test_session_id_reaches_the_memory_branch() {
    let memory = MockMemory::ok("past");
    let engine = engine_with(
        FlagInference::flags(true, false),
        memory.clone(),
        MockContext::ok("docs"),
        &DocflowConfig::default(),
    );

    engine
        .run_workflow("follow up", SessionContext::with_session("s-42"))
        .await
        .unwrap();

    let seen = memory.seen_sessions.lock().unwrap();
    assert_eq!(seen.as_slice(), ["s-42"]);
}
