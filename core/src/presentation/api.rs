// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API (axum)
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/health` | liveness and uptime |
//! | GET | `/v1/suggestions` | filtered keyset listing |
//! | GET | `/v1/suggestions/{id}` | full document |
//! | POST | `/v1/suggestions/{id}/approve` | `{actor, notes?}` |
//! | POST | `/v1/suggestions/{id}/reject` | `{actor, reason}` |
//! | POST | `/v1/deduplication/runs` | `{batch_size?}` |
//! | GET | `/v1/deduplication/runs` | recent run summaries |
//!
//! Errors are rendered as `{"error": {"kind": ..., "message": ...}}`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::application::deduplication::{DeduplicationError, DeduplicationOrchestrator};
use crate::application::lifecycle::{LifecycleError, LifecycleService};
use crate::application::review::{ListSuggestionsRequest, ReviewError, ReviewQueries};
use crate::domain::suggestion::SuggestionId;

pub struct AppState {
    pub lifecycle: Arc<dyn LifecycleService>,
    pub review: Arc<ReviewQueries>,
    pub orchestrator: Arc<DeduplicationOrchestrator>,
    pub default_batch_size: usize,
    pub start_time: Instant,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/suggestions", get(list_suggestions_handler))
        .route("/v1/suggestions/{id}", get(get_suggestion_handler))
        .route("/v1/suggestions/{id}/approve", post(approve_handler))
        .route("/v1/suggestions/{id}/reject", post(reject_handler))
        .route(
            "/v1/deduplication/runs",
            post(run_deduplication_handler).get(recent_runs_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(kind = self.kind, message = %self.message, "Request failed");
        }
        let body = Json(json!({
            "error": { "kind": self.kind, "message": self.message }
        }));
        (self.status, body).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        let message = err.to_string();
        match err {
            LifecycleError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            LifecycleError::Conflict { .. } => Self::new(StatusCode::CONFLICT, "conflict", message),
            LifecycleError::Contention { .. } => {
                Self::new(StatusCode::CONFLICT, "contention", message)
            }
            LifecycleError::Validation(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation", message)
            }
            LifecycleError::Repository(e) if e.is_unavailable() => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message)
            }
            LifecycleError::Repository(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        let message = err.to_string();
        match err {
            ReviewError::InvalidCursor => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_cursor", message)
            }
            ReviewError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            ReviewError::Repository(e) if e.is_unavailable() => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message)
            }
            ReviewError::Repository(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

impl From<DeduplicationError> for ApiError {
    fn from(err: DeduplicationError) -> Self {
        let message = err.to_string();
        match err {
            DeduplicationError::InvalidBatchSize => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation", message)
            }
            DeduplicationError::StoreUnavailable(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message)
            }
        }
    }
}

fn parse_id(raw: &str) -> Result<SuggestionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "invalid_id", format!("Invalid suggestion id '{}'", raw)))
}

/// Parse an optional JSON body; an empty body yields the default.
fn parse_body<T: for<'de> Deserialize<'de> + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn list_suggestions_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListSuggestionsRequest>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(request) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let listing = state.review.list(&request).await?;
    Ok(Json(listing))
}

async fn get_suggestion_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let suggestion = state.review.get(parse_id(&id)?).await?;
    Ok(Json(suggestion))
}

#[derive(Debug, Default, Deserialize)]
struct ApproveRequest {
    #[serde(default)]
    actor: String,
    notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RejectRequest {
    #[serde(default)]
    actor: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Default, Deserialize)]
struct RunRequest {
    batch_size: Option<usize>,
}

async fn approve_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let request: ApproveRequest = parse_body(&body)?;
    let record = state
        .lifecycle
        .approve(id, &request.actor, request.notes)
        .await?;
    Ok(Json(record))
}

async fn reject_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let request: RejectRequest = parse_body(&body)?;
    let record = state
        .lifecycle
        .reject(id, &request.actor, &request.reason)
        .await?;
    Ok(Json(record))
}

async fn run_deduplication_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: RunRequest = parse_body(&body)?;
    let batch_size = request.batch_size.unwrap_or(state.default_batch_size);
    let summary = state.orchestrator.run_deduplication(batch_size).await?;
    Ok(Json(summary))
}

async fn recent_runs_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.recent_runs())
}
