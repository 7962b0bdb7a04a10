// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts, following the DDD Repository pattern: interfaces
//! are defined in the domain layer and implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `SuggestionRepository` | `Suggestion` | `InMemorySuggestionRepository`, `PostgresSuggestionRepository` |
//! | `FailurePatternRepository` | `FailurePattern` (read-mostly) | `InMemoryFailurePatternRepository`, `PostgresFailurePatternRepository` |
//!
//! ## Write discipline
//!
//! `SuggestionRepository` is the only writer of suggestion documents. It
//! exposes exactly two mutating operations, [`SuggestionRepository::merge_or_create`]
//! and [`SuggestionRepository::transition_status`]. Both read every document
//! they touch before writing and commit with optimistic concurrency, retrying
//! a bounded number of times on contention.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::embedding::Embedding;
use crate::domain::pattern::{FailurePattern, PatternId};
use crate::domain::similarity::{MatchCandidate, SimilarityMatch};
use crate::domain::suggestion::{
    Severity, Suggestion, SuggestionId, SuggestionStatus, SuggestionType, TransitionRecord,
};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// What `merge_or_create` did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// The pattern founded a new suggestion, committed at `created_at`.
    Created {
        suggestion_id: SuggestionId,
        created_at: DateTime<Utc>,
    },
    /// The pattern's trace was appended to an existing suggestion at `merged_at`.
    Merged {
        suggestion_id: SuggestionId,
        score: f32,
        merged_at: DateTime<Utc>,
    },
    /// The trace was already recorded; nothing changed except the pattern flag.
    AlreadyPresent { suggestion_id: SuggestionId },
}

impl MergeOutcome {
    pub fn suggestion_id(&self) -> SuggestionId {
        match self {
            MergeOutcome::Created { suggestion_id, .. }
            | MergeOutcome::Merged { suggestion_id, .. }
            | MergeOutcome::AlreadyPresent { suggestion_id } => *suggestion_id,
        }
    }
}

/// Filters and keyset cursor for listing suggestions.
///
/// Results are ordered by `(created_at, id)` ascending; `after` is the id of
/// the last suggestion on the previous page. A `limit` of 0 is read as 1 so
/// an empty page always means the end of the results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionQuery {
    pub status: Option<SuggestionStatus>,
    pub suggestion_type: Option<SuggestionType>,
    pub severity: Option<Severity>,
    pub after: Option<SuggestionId>,
    pub limit: usize,
}

impl SuggestionQuery {
    /// Effective page size, never 0.
    pub fn page_size(&self) -> usize {
        self.limit.max(1)
    }

    pub fn matches(&self, suggestion: &Suggestion) -> bool {
        self.status.is_none_or(|s| suggestion.status() == s)
            && self
                .suggestion_type
                .is_none_or(|t| suggestion.suggestion_type() == t)
            && self.severity.is_none_or(|s| suggestion.severity() == s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionPage {
    pub items: Vec<Suggestion>,
    /// Present when more results may follow.
    pub next_cursor: Option<SuggestionId>,
}

/// Repository interface for the Suggestion aggregate
#[async_trait]
pub trait SuggestionRepository: Send + Sync {
    /// Atomically merge the pattern into `matched` (if any) or found a new
    /// suggestion, and mark the pattern processed in the same unit of work.
    ///
    /// A trace already recorded on any suggestion is a no-op
    /// ([`MergeOutcome::AlreadyPresent`]).
    async fn merge_or_create(
        &self,
        pattern: &FailurePattern,
        embedding: Embedding,
        matched: Option<SimilarityMatch>,
    ) -> Result<MergeOutcome, RepositoryError>;

    /// Atomically apply the terminal review decision.
    ///
    /// Fails with [`RepositoryError::Conflict`] unless the suggestion is pending.
    async fn transition_status(
        &self,
        id: SuggestionId,
        new_status: SuggestionStatus,
        actor: &str,
        notes: Option<String>,
    ) -> Result<TransitionRecord, RepositoryError>;

    /// Find suggestion by ID
    async fn find_by_id(&self, id: SuggestionId) -> Result<Option<Suggestion>, RepositoryError>;

    /// List suggestions matching the query (keyset pagination)
    async fn list(&self, query: &SuggestionQuery) -> Result<SuggestionPage, RepositoryError>;

    /// Comparison keys of every suggestion, for the matcher
    async fn match_snapshot(&self) -> Result<Vec<MatchCandidate>, RepositoryError>;
}

/// Repository interface for upstream failure patterns
#[async_trait]
pub trait FailurePatternRepository: Send + Sync {
    /// Store a pattern emitted by the extractor
    async fn insert(&self, pattern: &FailurePattern) -> Result<(), RepositoryError>;

    /// Unprocessed patterns ordered by `(extracted_at, pattern_id)`
    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<FailurePattern>, RepositoryError>;

    /// Find pattern by ID
    async fn find_by_id(&self, id: PatternId) -> Result<Option<FailurePattern>, RepositoryError>;

    /// Flip `processed` to true (idempotent)
    async fn mark_processed(&self, id: PatternId) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Suggestion already decided (status: {status})")]
    Conflict { status: SuggestionStatus },

    #[error("Transaction contention: gave up after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    /// The store cannot be read or written at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepositoryError::Unavailable(err.to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
