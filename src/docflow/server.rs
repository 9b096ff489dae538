// SPDX-License-Identifier: MIT

//! HTTP surface
//!
//! Thin adapter from HTTP requests to [`WorkflowEngine::run_workflow`]. No
//! auth, no persistence - those live outside this crate. A client disconnect
//! drops the handler future, which cancels any in-flight branches with it.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::docflow::error::DocflowError;
use crate::docflow::generation::ResponseGenerator;
use crate::docflow::workflow::{SessionContext, WorkflowEngine};

/// Shared handler state
pub struct AppState {
    pub engine: WorkflowEngine,
    /// When absent, `/api/query` returns the merged state without an answer
    pub generator: Option<ResponseGenerator>,
}

pub async fn serve(port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/query", post(run_query))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct QueryRequest {
    query: Option<String>,
    session_id: Option<String>,
}

async fn run_query(
    State(app): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let query = payload
        .query
        .ok_or_else(|| error_response(&DocflowError::invalid_input("missing 'query' field")))?;

    let session = SessionContext {
        session_id: payload.session_id,
    };

    let mut state = app
        .engine
        .run_workflow(&query, session)
        .await
        .map_err(|e| error_response(&e))?;

    if let Some(generator) = &app.generator {
        let answer = generator.generate(&state).await.map_err(|e| {
            log::error!("answer generation failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "answer generation failed" })),
            )
        })?;
        state.response = Some(answer);
    }

    serde_json::to_value(&state)
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}

fn error_response(err: &DocflowError) -> (StatusCode, Json<Value>) {
    let status = match err {
        DocflowError::InvalidInput(_) | DocflowError::EmptyQuery => StatusCode::BAD_REQUEST,
        DocflowError::ClassificationUnavailable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let (status, _) = error_response(&DocflowError::EmptyQuery);
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = error_response(&DocflowError::invalid_input("missing"));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = error_response(&DocflowError::Cancelled);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
