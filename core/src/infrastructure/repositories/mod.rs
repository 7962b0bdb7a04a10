// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! This module provides infrastructure implementations of repository abstractions
//! defined in the domain layer, following the Repository pattern from DDD.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve suggestions and failure patterns
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresSuggestionRepository** - Suggestion documents, trace claims and
//!   optimistic concurrency on the `revision` column
//! - **PostgresFailurePatternRepository** - Upstream pattern queue
//!
//! ## In-Memory Repositories
//!
//! Lightweight implementations for testing and development:
//! - **InMemorySuggestionRepository** - Revision-checked commits over a shared map
//! - **InMemoryFailurePatternRepository** - Ephemeral pattern queue
//!
//! # Unit of work
//!
//! Both implementations follow the same optimistic protocol: read every
//! document the operation touches, compute the new state outside the commit,
//! then commit only if no document's revision moved in between. A stale
//! commit is discarded and the whole operation is retried from the read, up
//! to `max_attempts` times.

pub mod postgres_pattern;
pub mod postgres_suggestion;

pub use postgres_pattern::PostgresFailurePatternRepository;
pub use postgres_suggestion::PostgresSuggestionRepository;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::domain::embedding::Embedding;
use crate::domain::pattern::{FailurePattern, PatternId, TraceId};
use crate::domain::repository::{
    FailurePatternRepository, MergeOutcome, RepositoryError, SuggestionPage, SuggestionQuery,
    SuggestionRepository,
};
use crate::domain::similarity::{MatchCandidate, SimilarityMatch};
use crate::domain::suggestion::{
    Suggestion, SuggestionError, SuggestionId, SuggestionStatus, TransitionRecord,
};

/// Default number of optimistic commit attempts per operation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Map an aggregate rule violation onto the repository taxonomy.
pub(crate) fn map_suggestion_error(err: SuggestionError) -> RepositoryError {
    match err {
        SuggestionError::AlreadyDecided { status } => RepositoryError::Conflict { status },
        SuggestionError::IllegalTransition { .. } => RepositoryError::Validation(err.to_string()),
    }
}

/// Sort by `(created_at, id)` and cut one keyset page of at least one item.
pub(crate) fn paginate(
    mut matching: Vec<Suggestion>,
    cursor: Option<&Suggestion>,
    limit: usize,
) -> SuggestionPage {
    let limit = limit.max(1);
    matching.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });

    let mut items: Vec<Suggestion> = matching
        .into_iter()
        .filter(|s| match cursor {
            Some(c) => (s.created_at(), s.id()) > (c.created_at(), c.id()),
            None => true,
        })
        .take(limit + 1)
        .collect();

    let next_cursor = if items.len() > limit {
        items.truncate(limit);
        items.last().map(|s| s.id())
    } else {
        None
    };

    SuggestionPage { items, next_cursor }
}

// ============================================================================
// Failure patterns
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemoryFailurePatternRepository {
    patterns: Arc<RwLock<HashMap<PatternId, FailurePattern>>>,
}

impl InMemoryFailurePatternRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn flip(&self, id: PatternId) {
        if let Some(pattern) = self.patterns.write().get_mut(&id) {
            pattern.processed = true;
        }
    }
}

#[async_trait]
impl FailurePatternRepository for InMemoryFailurePatternRepository {
    async fn insert(&self, pattern: &FailurePattern) -> Result<(), RepositoryError> {
        let mut patterns = self.patterns.write();
        if patterns.contains_key(&pattern.pattern_id) {
            return Err(RepositoryError::Validation(format!(
                "Pattern {} already exists",
                pattern.pattern_id
            )));
        }
        patterns.insert(pattern.pattern_id, pattern.clone());
        Ok(())
    }

    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<FailurePattern>, RepositoryError> {
        let patterns = self.patterns.read();
        let mut pending: Vec<FailurePattern> =
            patterns.values().filter(|p| !p.processed).cloned().collect();
        pending.sort_by(|a, b| {
            a.extracted_at
                .cmp(&b.extracted_at)
                .then_with(|| a.pattern_id.cmp(&b.pattern_id))
        });
        pending.truncate(limit);
        Ok(pending)
    }

    async fn find_by_id(&self, id: PatternId) -> Result<Option<FailurePattern>, RepositoryError> {
        Ok(self.patterns.read().get(&id).cloned())
    }

    async fn mark_processed(&self, id: PatternId) -> Result<(), RepositoryError> {
        self.flip(id);
        Ok(())
    }
}

// ============================================================================
// Suggestions
// ============================================================================

#[derive(Default)]
struct SuggestionState {
    suggestions: HashMap<SuggestionId, Suggestion>,
    /// trace id -> owning suggestion
    trace_claims: HashMap<TraceId, SuggestionId>,
}

/// A computed write waiting for its revision check.
#[derive(Debug)]
enum PlannedWrite {
    /// Trace already claimed; only the pattern flag changes.
    AlreadyPresent { suggestion_id: SuggestionId },
    Create { suggestion: Suggestion },
    Update {
        suggestion: Suggestion,
        expected_revision: u64,
        score: f32,
    },
}

#[derive(Clone)]
pub struct InMemorySuggestionRepository {
    state: Arc<RwLock<SuggestionState>>,
    patterns: InMemoryFailurePatternRepository,
    max_attempts: u32,
}

impl InMemorySuggestionRepository {
    /// The pattern repository whose `processed` flag is flipped in the same
    /// commit as each merge.
    pub fn new(patterns: InMemoryFailurePatternRepository) -> Self {
        Self {
            state: Arc::new(RwLock::new(SuggestionState::default())),
            patterns,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    fn plan_merge(
        &self,
        pattern: &FailurePattern,
        embedding: &Embedding,
        matched: Option<SimilarityMatch>,
    ) -> Result<PlannedWrite, RepositoryError> {
        let state = self.state.read();

        if let Some(owner) = state.trace_claims.get(&pattern.trace_id) {
            return Ok(PlannedWrite::AlreadyPresent {
                suggestion_id: *owner,
            });
        }

        match matched {
            Some(m) => {
                let mut suggestion = state
                    .suggestions
                    .get(&m.suggestion_id)
                    .cloned()
                    .ok_or_else(|| {
                        RepositoryError::NotFound(format!("Suggestion {}", m.suggestion_id))
                    })?;
                let expected_revision = suggestion.revision();
                suggestion.absorb(pattern, m.score);
                Ok(PlannedWrite::Update {
                    suggestion,
                    expected_revision,
                    score: m.score,
                })
            }
            None => Ok(PlannedWrite::Create {
                suggestion: Suggestion::found(pattern, embedding.clone()),
            }),
        }
    }

    /// Apply a planned write. `Ok(None)` means the plan went stale.
    fn try_commit(
        &self,
        pattern: &FailurePattern,
        plan: PlannedWrite,
    ) -> Result<Option<MergeOutcome>, RepositoryError> {
        let mut state = self.state.write();

        let outcome = match plan {
            PlannedWrite::AlreadyPresent { suggestion_id } => {
                MergeOutcome::AlreadyPresent { suggestion_id }
            }
            PlannedWrite::Create { suggestion } => {
                if state.trace_claims.contains_key(&pattern.trace_id) {
                    return Ok(None);
                }
                let suggestion_id = suggestion.id();
                let created_at = suggestion.created_at();
                state
                    .trace_claims
                    .insert(pattern.trace_id.clone(), suggestion_id);
                state.suggestions.insert(suggestion_id, suggestion);
                MergeOutcome::Created {
                    suggestion_id,
                    created_at,
                }
            }
            PlannedWrite::Update {
                suggestion,
                expected_revision,
                score,
            } => {
                let current = state
                    .suggestions
                    .get(&suggestion.id())
                    .map(|s| s.revision());
                if current != Some(expected_revision)
                    || state.trace_claims.contains_key(&pattern.trace_id)
                {
                    return Ok(None);
                }
                let suggestion_id = suggestion.id();
                let merged_at = suggestion.updated_at();
                state
                    .trace_claims
                    .insert(pattern.trace_id.clone(), suggestion_id);
                state.suggestions.insert(suggestion_id, suggestion);
                MergeOutcome::Merged {
                    suggestion_id,
                    score,
                    merged_at,
                }
            }
        };

        // Flipped while the suggestion write lock is held
        self.patterns.flip(pattern.pattern_id);
        Ok(Some(outcome))
    }

    fn plan_transition(
        &self,
        id: SuggestionId,
        new_status: SuggestionStatus,
        actor: &str,
        notes: Option<String>,
    ) -> Result<(Suggestion, u64, TransitionRecord), RepositoryError> {
        let mut suggestion = self
            .state
            .read()
            .suggestions
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Suggestion {}", id)))?;
        let expected_revision = suggestion.revision();
        let record = suggestion
            .transition_to(new_status, actor, notes)
            .map_err(map_suggestion_error)?;
        Ok((suggestion, expected_revision, record))
    }

    fn try_commit_transition(&self, suggestion: Suggestion, expected_revision: u64) -> bool {
        let mut state = self.state.write();
        let current = state.suggestions.get(&suggestion.id()).map(|s| s.revision());
        if current != Some(expected_revision) {
            return false;
        }
        state.suggestions.insert(suggestion.id(), suggestion);
        true
    }
}

#[async_trait]
impl SuggestionRepository for InMemorySuggestionRepository {
    async fn merge_or_create(
        &self,
        pattern: &FailurePattern,
        embedding: Embedding,
        matched: Option<SimilarityMatch>,
    ) -> Result<MergeOutcome, RepositoryError> {
        for attempt in 1..=self.max_attempts {
            let plan = self.plan_merge(pattern, &embedding, matched)?;
            if let Some(outcome) = self.try_commit(pattern, plan)? {
                if let MergeOutcome::AlreadyPresent { suggestion_id } = outcome {
                    warn!(
                        trace_id = %pattern.trace_id,
                        suggestion_id = %suggestion_id,
                        "Trace already recorded on a suggestion, skipping"
                    );
                }
                return Ok(outcome);
            }
            debug!(attempt, pattern_id = %pattern.pattern_id, "Stale merge, retrying");
            metrics::counter!("remedy_transaction_retries_total").increment(1);
        }

        Err(RepositoryError::Contention {
            attempts: self.max_attempts,
        })
    }

    async fn transition_status(
        &self,
        id: SuggestionId,
        new_status: SuggestionStatus,
        actor: &str,
        notes: Option<String>,
    ) -> Result<TransitionRecord, RepositoryError> {
        for attempt in 1..=self.max_attempts {
            let (suggestion, expected_revision, record) =
                self.plan_transition(id, new_status, actor, notes.clone())?;
            if self.try_commit_transition(suggestion, expected_revision) {
                return Ok(record);
            }
            debug!(attempt, suggestion_id = %id, "Stale transition, retrying");
            metrics::counter!("remedy_transaction_retries_total").increment(1);
        }

        Err(RepositoryError::Contention {
            attempts: self.max_attempts,
        })
    }

    async fn find_by_id(&self, id: SuggestionId) -> Result<Option<Suggestion>, RepositoryError> {
        Ok(self.state.read().suggestions.get(&id).cloned())
    }

    async fn list(&self, query: &SuggestionQuery) -> Result<SuggestionPage, RepositoryError> {
        let state = self.state.read();

        let cursor = match query.after {
            Some(after) => Some(state.suggestions.get(&after).ok_or_else(|| {
                RepositoryError::Validation(format!("Unknown cursor {}", after))
            })?),
            None => None,
        };

        let matching: Vec<Suggestion> = state
            .suggestions
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();

        Ok(paginate(matching, cursor, query.page_size()))
    }

    async fn match_snapshot(&self) -> Result<Vec<MatchCandidate>, RepositoryError> {
        Ok(self
            .state
            .read()
            .suggestions
            .values()
            .map(MatchCandidate::from)
            .collect())
    }
}
