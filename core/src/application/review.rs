// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Review queries
//!
//! Read side for review clients: filtered keyset listing and single lookup.
//! Cursors are opaque to clients (base64url of the last suggestion id).

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::pattern::FailureCategory;
use crate::domain::repository::{RepositoryError, SuggestionQuery, SuggestionRepository};
use crate::domain::suggestion::{
    Severity, Suggestion, SuggestionId, SuggestionStatus, SuggestionType,
};

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Invalid cursor")]
    InvalidCursor,

    #[error("Suggestion {0} not found")]
    NotFound(SuggestionId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub fn encode_cursor(id: SuggestionId) -> String {
    URL_SAFE_NO_PAD.encode(id.0.as_bytes())
}

pub fn decode_cursor(cursor: &str) -> Result<SuggestionId, ReviewError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.trim())
        .map_err(|_| ReviewError::InvalidCursor)?;
    uuid::Uuid::from_slice(&bytes)
        .map(SuggestionId)
        .map_err(|_| ReviewError::InvalidCursor)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSuggestionsRequest {
    pub status: Option<SuggestionStatus>,
    #[serde(rename = "type")]
    pub suggestion_type: Option<SuggestionType>,
    pub severity: Option<Severity>,
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

/// Listing row; the full document (embedding, traces, history) is served by `get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSummary {
    pub id: SuggestionId,
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub status: SuggestionStatus,
    pub severity: Severity,
    pub failure_category: FailureCategory,
    pub title: String,
    pub trace_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Suggestion> for SuggestionSummary {
    fn from(s: &Suggestion) -> Self {
        Self {
            id: s.id(),
            suggestion_type: s.suggestion_type(),
            status: s.status(),
            severity: s.severity(),
            failure_category: s.pattern_summary().failure_category,
            title: s.pattern_summary().title.clone(),
            trace_count: s.source_traces().len(),
            created_at: s.created_at(),
            updated_at: s.updated_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionListing {
    pub items: Vec<SuggestionSummary>,
    pub next_cursor: Option<String>,
}

pub struct ReviewQueries {
    suggestions: Arc<dyn SuggestionRepository>,
}

impl ReviewQueries {
    pub fn new(suggestions: Arc<dyn SuggestionRepository>) -> Self {
        Self { suggestions }
    }

    pub async fn list(&self, request: &ListSuggestionsRequest) -> Result<SuggestionListing, ReviewError> {
        let after = request.cursor.as_deref().map(decode_cursor).transpose()?;
        let query = SuggestionQuery {
            status: request.status,
            suggestion_type: request.suggestion_type,
            severity: request.severity,
            after,
            limit: request
                .limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
        };

        let page = self.suggestions.list(&query).await.map_err(|e| match e {
            // The cursor names a suggestion that does not exist
            RepositoryError::Validation(_) if after.is_some() => ReviewError::InvalidCursor,
            other => ReviewError::Repository(other),
        })?;

        Ok(SuggestionListing {
            items: page.items.iter().map(SuggestionSummary::from).collect(),
            next_cursor: page.next_cursor.map(encode_cursor),
        })
    }

    pub async fn get(&self, id: SuggestionId) -> Result<Suggestion, ReviewError> {
        self.suggestions
            .find_by_id(id)
            .await?
            .ok_or(ReviewError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::FailurePattern;
    use crate::infrastructure::repositories::{
        InMemoryFailurePatternRepository, InMemorySuggestionRepository,
    };

    async fn seeded(count: usize) -> ReviewQueries {
        let repo = Arc::new(InMemorySuggestionRepository::new(
            InMemoryFailurePatternRepository::new(),
        ));
        for i in 0..count {
            repo.merge_or_create(
                &FailurePattern::new(format!("t-{i}"), "tool_error", "api returned 500"),
                vec![1.0],
                None,
            )
            .await
            .unwrap();
        }
        ReviewQueries::new(repo)
    }

    #[test]
    fn test_cursor_is_opaque_and_reversible() {
        let id = SuggestionId::new();
        let cursor = encode_cursor(id);
        assert_eq!(cursor.len(), 22);
        assert_ne!(cursor, id.to_string());
        assert_eq!(decode_cursor(&cursor).unwrap(), id);
    }

    #[test]
    fn test_garbage_cursor_is_rejected() {
        assert!(matches!(decode_cursor("!!!"), Err(ReviewError::InvalidCursor)));
        assert!(matches!(decode_cursor("YWJj"), Err(ReviewError::InvalidCursor)));
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let queries = seeded(3).await;

        let page = queries
            .list(&ListSuggestionsRequest {
                limit: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_cursor.is_some());

        let page = queries
            .list(&ListSuggestionsRequest {
                limit: Some(10_000),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_cursor_for_unknown_suggestion_is_invalid() {
        let queries = seeded(1).await;
        let err = queries
            .list(&ListSuggestionsRequest {
                cursor: Some(encode_cursor(SuggestionId::new())),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidCursor));
    }

    #[tokio::test]
    async fn test_summary_carries_trace_count() {
        let queries = seeded(1).await;
        let page = queries.list(&ListSuggestionsRequest::default()).await.unwrap();
        assert_eq!(page.items[0].trace_count, 1);
        assert_eq!(page.items[0].suggestion_type, SuggestionType::Runbook);
    }
}
