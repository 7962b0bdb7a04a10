// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Deduplication Orchestrator
//!
//! Batch loop turning unprocessed failure patterns into merged or newly
//! founded suggestions.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Collaborators:**
//!   - Domain: FailurePattern validation, SimilarityMatcher
//!   - Infrastructure: EmbeddingProvider, SuggestionRepository,
//!     FailurePatternRepository, EventBus
//!
//! # Flow
//!
//! 1. Fetch up to `batch_size` unprocessed patterns, ordered by
//!    `(extracted_at, pattern_id)`
//! 2. Take a match snapshot of every existing suggestion
//! 3. For each pattern, sequentially: validate → embed → match → merge or create
//! 4. Fold newly founded suggestions into the snapshot so later patterns in
//!    the same batch can merge into them
//! 5. Publish `RunCompleted` and return the run summary
//!
//! # Error Handling
//!
//! A failure on one pattern is recorded in the summary and the batch
//! continues. Only an unavailable store aborts the run.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::embedding::{EmbeddingError, EmbeddingProvider};
use crate::domain::events::{DeduplicationEvent, SuggestionEvent};
use crate::domain::pattern::{FailurePattern, PatternError, PatternId, TraceId};
use crate::domain::repository::{
    FailurePatternRepository, MergeOutcome, RepositoryError, SuggestionRepository,
};
use crate::domain::similarity::{MatchCandidate, SimilarityMatcher};
use crate::infrastructure::event_bus::EventBus;

/// Number of run summaries kept for `recent_runs()`.
pub const RECENT_RUNS_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternFailure {
    pub pattern_id: PatternId,
    pub trace_id: TraceId,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub patterns_processed: usize,
    pub suggestions_created: usize,
    pub suggestions_merged: usize,
    pub patterns_errored: usize,
    /// Patterns whose trace was already recorded (idempotent replays)
    pub patterns_skipped: usize,
    /// Mean similarity of merges; `None` when nothing merged
    pub average_similarity: Option<f32>,
    pub errors: Vec<PatternFailure>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeduplicationError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,
}

/// Why a single pattern could not be processed.
#[derive(Debug, thiserror::Error)]
enum ProcessError {
    #[error(transparent)]
    Malformed(#[from] PatternError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ProcessError {
    fn kind(&self) -> &'static str {
        match self {
            ProcessError::Malformed(_) => "malformed",
            ProcessError::Embedding(_) => "embedding",
            ProcessError::Repository(RepositoryError::Contention { .. }) => "contention",
            ProcessError::Repository(_) => "repository",
        }
    }

    fn is_store_unavailable(&self) -> bool {
        matches!(self, ProcessError::Repository(e) if e.is_unavailable())
    }
}

/// Running totals for one batch.
#[derive(Default)]
struct RunTally {
    processed: usize,
    created: usize,
    merged: usize,
    skipped: usize,
    similarity_sum: f64,
    errors: Vec<PatternFailure>,
}

impl RunTally {
    fn record(&mut self, outcome: &MergeOutcome) {
        self.processed += 1;
        match outcome {
            MergeOutcome::Created { .. } => self.created += 1,
            MergeOutcome::Merged { score, .. } => {
                self.merged += 1;
                self.similarity_sum += f64::from(*score);
            }
            MergeOutcome::AlreadyPresent { .. } => self.skipped += 1,
        }
    }

    fn into_summary(self, run_id: Uuid, started_at: DateTime<Utc>) -> RunSummary {
        let average_similarity = if self.merged > 0 {
            Some((self.similarity_sum / self.merged as f64) as f32)
        } else {
            None
        };

        RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            patterns_processed: self.processed,
            suggestions_created: self.created,
            suggestions_merged: self.merged,
            patterns_errored: self.errors.len(),
            patterns_skipped: self.skipped,
            average_similarity,
            errors: self.errors,
        }
    }
}

pub struct DeduplicationOrchestrator {
    patterns: Arc<dyn FailurePatternRepository>,
    suggestions: Arc<dyn SuggestionRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    matcher: SimilarityMatcher,
    event_bus: Arc<EventBus>,
    run_lock: tokio::sync::Mutex<()>,
    recent: Mutex<VecDeque<RunSummary>>,
}

impl DeduplicationOrchestrator {
    pub fn new(
        patterns: Arc<dyn FailurePatternRepository>,
        suggestions: Arc<dyn SuggestionRepository>,
        embedder: Arc<dyn EmbeddingProvider>,
        matcher: SimilarityMatcher,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            patterns,
            suggestions,
            embedder,
            matcher,
            event_bus,
            run_lock: tokio::sync::Mutex::new(()),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_RUNS_CAPACITY)),
        }
    }

    /// Most recent run summaries, newest first.
    pub fn recent_runs(&self) -> Vec<RunSummary> {
        self.recent.lock().iter().cloned().collect()
    }

    /// Process one batch of unprocessed patterns. Runs are serialized.
    pub async fn run_deduplication(
        &self,
        batch_size: usize,
    ) -> Result<RunSummary, DeduplicationError> {
        if batch_size == 0 {
            return Err(DeduplicationError::InvalidBatchSize);
        }

        let _guard = self.run_lock.lock().await;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(%run_id, batch_size, provider = self.embedder.name(), "Deduplication run started");
        self.event_bus
            .publish_deduplication_event(DeduplicationEvent::RunStarted {
                run_id,
                batch_size,
                started_at,
            });

        let mut batch = self
            .patterns
            .fetch_unprocessed(batch_size)
            .await
            .map_err(|e| DeduplicationError::StoreUnavailable(e.to_string()))?;
        batch.sort_by(|a, b| {
            a.extracted_at
                .cmp(&b.extracted_at)
                .then_with(|| a.pattern_id.cmp(&b.pattern_id))
        });

        let mut snapshot = self
            .suggestions
            .match_snapshot()
            .await
            .map_err(|e| DeduplicationError::StoreUnavailable(e.to_string()))?;
        debug!(%run_id, patterns = batch.len(), suggestions = snapshot.len(), "Batch loaded");

        let mut tally = RunTally::default();

        for pattern in &batch {
            match self.process_pattern(pattern, &mut snapshot).await {
                Ok(outcome) => {
                    metrics::counter!(
                        "remedy_patterns_processed_total",
                        "outcome" => outcome_label(&outcome)
                    )
                    .increment(1);
                    tally.record(&outcome);
                }
                Err(e) if e.is_store_unavailable() => {
                    warn!(%run_id, pattern_id = %pattern.pattern_id, error = %e, "Store unavailable, aborting run");
                    return Err(DeduplicationError::StoreUnavailable(e.to_string()));
                }
                Err(e) => {
                    warn!(
                        %run_id,
                        pattern_id = %pattern.pattern_id,
                        trace_id = %pattern.trace_id,
                        kind = e.kind(),
                        error = %e,
                        "Failed to process pattern"
                    );
                    metrics::counter!("remedy_patterns_processed_total", "outcome" => "errored")
                        .increment(1);
                    self.event_bus
                        .publish_deduplication_event(DeduplicationEvent::PatternFailed {
                            run_id,
                            pattern_id: pattern.pattern_id,
                            trace_id: pattern.trace_id.clone(),
                            error: e.to_string(),
                            failed_at: Utc::now(),
                        });
                    tally.errors.push(PatternFailure {
                        pattern_id: pattern.pattern_id,
                        trace_id: pattern.trace_id.clone(),
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let summary = tally.into_summary(run_id, started_at);
        info!(
            %run_id,
            processed = summary.patterns_processed,
            created = summary.suggestions_created,
            merged = summary.suggestions_merged,
            skipped = summary.patterns_skipped,
            errored = summary.patterns_errored,
            "Deduplication run completed"
        );
        self.event_bus
            .publish_deduplication_event(DeduplicationEvent::RunCompleted {
                run_id,
                patterns_processed: summary.patterns_processed,
                suggestions_created: summary.suggestions_created,
                suggestions_merged: summary.suggestions_merged,
                patterns_errored: summary.patterns_errored,
                finished_at: summary.finished_at,
            });

        let mut recent = self.recent.lock();
        if recent.len() == RECENT_RUNS_CAPACITY {
            recent.pop_back();
        }
        recent.push_front(summary.clone());

        Ok(summary)
    }

    async fn process_pattern(
        &self,
        pattern: &FailurePattern,
        snapshot: &mut Vec<MatchCandidate>,
    ) -> Result<MergeOutcome, ProcessError> {
        if let Err(e) = pattern.validate() {
            // Retrying cannot fix a malformed pattern; take it out of the queue
            self.patterns.mark_processed(pattern.pattern_id).await?;
            return Err(e.into());
        }

        let embedding = self.embedder.embed(&pattern.embedding_text()).await?;
        let matched = self.matcher.find_best_match(&embedding, snapshot);

        let outcome = self
            .suggestions
            .merge_or_create(pattern, embedding.clone(), matched)
            .await?;

        match outcome {
            MergeOutcome::Created {
                suggestion_id,
                created_at,
            } => {
                snapshot.push(MatchCandidate {
                    suggestion_id,
                    embedding,
                    created_at,
                });
                self.event_bus
                    .publish_suggestion_event(SuggestionEvent::SuggestionCreated {
                        suggestion_id,
                        pattern_id: pattern.pattern_id,
                        trace_id: pattern.trace_id.clone(),
                        suggestion_type: pattern.category().suggestion_type(),
                        severity: pattern.severity,
                        created_at,
                    });
                info!(
                    pattern_id = %pattern.pattern_id,
                    suggestion_id = %suggestion_id,
                    "Founded new suggestion"
                );
            }
            MergeOutcome::Merged {
                suggestion_id,
                score,
                merged_at,
            } => {
                self.event_bus
                    .publish_suggestion_event(SuggestionEvent::SuggestionMerged {
                        suggestion_id,
                        pattern_id: pattern.pattern_id,
                        trace_id: pattern.trace_id.clone(),
                        similarity_score: score,
                        merged_at,
                    });
                info!(
                    pattern_id = %pattern.pattern_id,
                    suggestion_id = %suggestion_id,
                    score,
                    "Merged pattern into suggestion"
                );
            }
            MergeOutcome::AlreadyPresent { .. } => {}
        }

        Ok(outcome)
    }
}

fn outcome_label(outcome: &MergeOutcome) -> &'static str {
    match outcome {
        MergeOutcome::Created { .. } => "created",
        MergeOutcome::Merged { .. } => "merged",
        MergeOutcome::AlreadyPresent { .. } => "skipped",
    }
}
