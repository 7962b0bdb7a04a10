// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Store-level checks against a live PostgreSQL.
//!
//! Run with `REMEDY_DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::sync::Arc;

use uuid::Uuid;

use remedy_core::domain::pattern::FailurePattern;
use remedy_core::domain::repository::{
    FailurePatternRepository, MergeOutcome, PostgresConfig, RepositoryError, SuggestionRepository,
};
use remedy_core::domain::similarity::SimilarityMatch;
use remedy_core::domain::suggestion::SuggestionStatus;
use remedy_core::infrastructure::db::Database;
use remedy_core::infrastructure::repositories::{
    PostgresFailurePatternRepository, PostgresSuggestionRepository,
};

async fn repos() -> (PostgresFailurePatternRepository, PostgresSuggestionRepository) {
    let url = std::env::var("REMEDY_DATABASE_URL").expect("REMEDY_DATABASE_URL must be set");
    let db = Database::new(&PostgresConfig {
        connection_string: url,
        max_connections: 5,
    })
    .await
    .expect("connect");
    db.migrate().await.expect("migrate");
    let pool = db.get_pool().clone();
    (
        PostgresFailurePatternRepository::new(pool.clone()),
        PostgresSuggestionRepository::new(pool),
    )
}

/// A pattern whose trace id is unique to this test run.
fn fresh_pattern() -> FailurePattern {
    FailurePattern::new(
        format!("trace-{}", Uuid::new_v4()),
        "tool_error",
        "search api returned 500",
    )
}

#[tokio::test]
#[ignore]
async fn test_merge_flips_pattern_in_same_transaction() {
    let (patterns, suggestions) = repos().await;
    let founder = fresh_pattern();
    let follower = fresh_pattern();
    patterns.insert(&founder).await.unwrap();
    patterns.insert(&follower).await.unwrap();

    let id = suggestions
        .merge_or_create(&founder, vec![1.0, 0.0], None)
        .await
        .unwrap()
        .suggestion_id();
    assert!(patterns.find_by_id(founder.pattern_id).await.unwrap().unwrap().processed);
    assert!(!patterns.find_by_id(follower.pattern_id).await.unwrap().unwrap().processed);

    let outcome = suggestions
        .merge_or_create(
            &follower,
            vec![0.9, 0.1],
            Some(SimilarityMatch {
                suggestion_id: id,
                score: 0.9,
            }),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, MergeOutcome::Merged { suggestion_id, .. } if suggestion_id == id));
    assert!(patterns.find_by_id(follower.pattern_id).await.unwrap().unwrap().processed);
    let stored = suggestions.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.source_traces().len(), 2);
    assert_eq!(stored.source_traces()[1].trace_id, follower.trace_id);
}

#[tokio::test]
#[ignore]
async fn test_replayed_trace_is_a_no_op() {
    let (patterns, suggestions) = repos().await;
    let pattern = fresh_pattern();
    patterns.insert(&pattern).await.unwrap();

    let outcome = suggestions
        .merge_or_create(&pattern, vec![1.0, 0.0], None)
        .await
        .unwrap();
    let MergeOutcome::Created {
        suggestion_id,
        created_at,
    } = outcome
    else {
        panic!("expected create, got {outcome:?}");
    };

    // Same trace again, this time pointed at the suggestion it already belongs to
    let replay = suggestions
        .merge_or_create(
            &pattern,
            vec![1.0, 0.0],
            Some(SimilarityMatch {
                suggestion_id,
                score: 1.0,
            }),
        )
        .await
        .unwrap();

    assert_eq!(replay, MergeOutcome::AlreadyPresent { suggestion_id });
    let stored = suggestions.find_by_id(suggestion_id).await.unwrap().unwrap();
    assert_eq!(stored.source_traces().len(), 1);
    assert_eq!(stored.revision(), 1);
    assert_eq!(stored.created_at(), created_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_approvals_have_single_winner() {
    let (patterns, suggestions) = repos().await;
    let pattern = fresh_pattern();
    patterns.insert(&pattern).await.unwrap();
    let id = suggestions
        .merge_or_create(&pattern, vec![1.0, 0.0], None)
        .await
        .unwrap()
        .suggestion_id();

    let suggestions = Arc::new(suggestions);
    let handles: Vec<_> = ["alice", "bob"]
        .into_iter()
        .map(|actor| {
            let suggestions = suggestions.clone();
            tokio::spawn(async move {
                suggestions
                    .transition_status(id, SuggestionStatus::Approved, actor, None)
                    .await
            })
        })
        .collect();

    let mut won = 0;
    let mut conflicted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(RepositoryError::Conflict { status }) => {
                assert_eq!(status, SuggestionStatus::Approved);
                conflicted += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((won, conflicted), (1, 1));

    let stored = suggestions.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.status(), SuggestionStatus::Approved);
    assert_eq!(stored.version_history().len(), 2);
}
