// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use remedy_core::domain::pattern::FailurePattern;
use remedy_core::domain::repository::FailurePatternRepository;
use remedy_core::domain::suggestion::Severity;
use remedy_core::presentation::api::{app, AppState};

async fn router() -> (Router, common::Stack) {
    let stack = common::stack(0.85);
    let router = app(AppState {
        lifecycle: stack.lifecycle.clone(),
        review: stack.review.clone(),
        orchestrator: stack.orchestrator.clone(),
        default_batch_size: 100,
        start_time: Instant::now(),
    });
    (router, stack)
}

async fn seeded_router() -> (Router, String) {
    let (router, stack) = router().await;
    stack
        .embedder
        .register("tool_error", "search api returned 500", vec![1.0, 0.0]);
    stack
        .patterns
        .insert(&FailurePattern::new("trace-1", "tool_error", "search api returned 500"))
        .await
        .unwrap();

    let (status, _) = send(&router, Method::POST, "/v1/deduplication/runs", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = send(&router, Method::GET, "/v1/suggestions", None).await;
    let id = listing["items"][0]["id"].as_str().unwrap().to_string();
    (router, id)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (router, _) = router().await;
    let (status, body) = send(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_run_then_list_and_get() {
    let (router, id) = seeded_router().await;

    let (status, listing) = send(&router, Method::GET, "/v1/suggestions?status=pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["items"].as_array().unwrap().len(), 1);
    assert_eq!(listing["items"][0]["type"], "runbook");
    assert_eq!(listing["items"][0]["traceCount"], 1);
    assert!(listing["nextCursor"].is_null());

    let (status, suggestion) = send(&router, Method::GET, &format!("/v1/suggestions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(suggestion["status"], "pending");
    assert_eq!(suggestion["sourceTraces"][0]["traceId"], "trace-1");
}

#[tokio::test]
async fn test_list_filters_by_type_and_severity_across_pages() {
    let (router, stack) = router().await;
    let inputs = [
        ("t-1", "tool_error", "search api returned 500", Severity::High, vec![1.0, 0.0]),
        ("t-2", "timeout", "retriever never answered", Severity::Low, vec![0.0, 1.0]),
        ("t-3", "format_violation", "answer was not json", Severity::High, vec![-1.0, 0.0]),
    ];
    let now = Utc::now();
    for (i, (trace, failure_type, trigger, severity, vector)) in inputs.into_iter().enumerate() {
        stack.embedder.register(failure_type, trigger, vector);
        stack
            .patterns
            .insert(
                &FailurePattern::new(trace, failure_type, trigger)
                    .with_severity(severity)
                    .with_extracted_at(now + Duration::seconds(i as i64)),
            )
            .await
            .unwrap();
    }
    let (_, summary) = send(&router, Method::POST, "/v1/deduplication/runs", None).await;
    assert_eq!(summary["suggestionsCreated"], 3);

    let (status, listing) = send(&router, Method::GET, "/v1/suggestions?type=runbook", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["items"].as_array().unwrap().len(), 2);

    let (_, listing) = send(&router, Method::GET, "/v1/suggestions?severity=low", None).await;
    let items = listing["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["failureCategory"], "timeout");

    let (_, listing) = send(
        &router,
        Method::GET,
        "/v1/suggestions?type=runbook&severity=high",
        None,
    )
    .await;
    let items = listing["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["failureCategory"], "tool_error");

    let (_, first) = send(&router, Method::GET, "/v1/suggestions?type=runbook&limit=1", None).await;
    assert_eq!(first["items"].as_array().unwrap().len(), 1);
    let cursor = first["nextCursor"].as_str().unwrap().to_string();

    let (status, second) = send(
        &router,
        Method::GET,
        &format!("/v1/suggestions?type=runbook&limit=1&cursor={cursor}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["items"].as_array().unwrap().len(), 1);
    assert!(second["nextCursor"].is_null());
    assert_ne!(first["items"][0]["id"], second["items"][0]["id"]);
    assert_eq!(second["items"][0]["type"], "runbook");
}

#[tokio::test]
async fn test_list_rejects_unknown_filter_value() {
    let (router, _) = router().await;
    let (status, body) = send(&router, Method::GET, "/v1/suggestions?status=archived", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "bad_request");
}

#[tokio::test]
async fn test_list_rejects_garbage_cursor() {
    let (router, _) = router().await;
    let (status, body) = send(&router, Method::GET, "/v1/suggestions?cursor=%21%21", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_cursor");
}

#[tokio::test]
async fn test_get_unknown_and_malformed_ids() {
    let (router, _) = router().await;

    let (status, body) = send(
        &router,
        Method::GET,
        "/v1/suggestions/5f0e1a52-8c8e-4b8a-9d55-0f6f1d2e3a4b",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");

    let (status, body) = send(&router, Method::GET, "/v1/suggestions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_id");
}

#[tokio::test]
async fn test_approve_then_conflict() {
    let (router, id) = seeded_router().await;
    let uri = format!("/v1/suggestions/{id}/approve");

    let (status, record) = send(
        &router,
        Method::POST,
        &uri,
        Some(json!({"actor": "alice", "notes": "add to guardrails"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["previousStatus"], "pending");
    assert_eq!(record["newStatus"], "approved");
    assert_eq!(record["actor"], "alice");

    let (status, body) = send(&router, Method::POST, &uri, Some(json!({"actor": "bob"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "conflict");
}

#[tokio::test]
async fn test_reject_requires_reason() {
    let (router, id) = seeded_router().await;
    let uri = format!("/v1/suggestions/{id}/reject");

    let (status, body) = send(&router, Method::POST, &uri, Some(json!({"actor": "bob"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "validation");

    let (status, record) = send(
        &router,
        Method::POST,
        &uri,
        Some(json!({"actor": "bob", "reason": "flaky upstream, not ours"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["newStatus"], "rejected");
}

#[tokio::test]
async fn test_invalid_batch_size_and_recent_runs() {
    let (router, _) = router().await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/v1/deduplication/runs",
        Some(json!({"batch_size": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "validation");

    let (status, summary) = send(&router, Method::POST, "/v1/deduplication/runs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["patternsProcessed"], 0);

    let (status, runs) = send(&router, Method::GET, "/v1/deduplication/runs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["runId"], summary["runId"]);
}
