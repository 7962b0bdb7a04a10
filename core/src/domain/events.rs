// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::domain::pattern::{PatternId, TraceId};
use crate::domain::suggestion::{SuggestionId, SuggestionStatus, SuggestionType, Severity};

/// Suggestion lifecycle events
///
/// Published after the corresponding repository commit succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SuggestionEvent {
    SuggestionCreated {
        suggestion_id: SuggestionId,
        pattern_id: PatternId,
        trace_id: TraceId,
        suggestion_type: SuggestionType,
        severity: Severity,
        created_at: DateTime<Utc>,
    },
    SuggestionMerged {
        suggestion_id: SuggestionId,
        pattern_id: PatternId,
        trace_id: TraceId,
        similarity_score: f32,
        merged_at: DateTime<Utc>,
    },
    SuggestionApproved {
        suggestion_id: SuggestionId,
        actor: String,
        approved_at: DateTime<Utc>,
    },
    SuggestionRejected {
        suggestion_id: SuggestionId,
        actor: String,
        reason: String,
        rejected_at: DateTime<Utc>,
    },
}

impl SuggestionEvent {
    pub fn suggestion_id(&self) -> SuggestionId {
        match self {
            SuggestionEvent::SuggestionCreated { suggestion_id, .. }
            | SuggestionEvent::SuggestionMerged { suggestion_id, .. }
            | SuggestionEvent::SuggestionApproved { suggestion_id, .. }
            | SuggestionEvent::SuggestionRejected { suggestion_id, .. } => *suggestion_id,
        }
    }

    pub fn decided_status(&self) -> Option<SuggestionStatus> {
        match self {
            SuggestionEvent::SuggestionApproved { .. } => Some(SuggestionStatus::Approved),
            SuggestionEvent::SuggestionRejected { .. } => Some(SuggestionStatus::Rejected),
            _ => None,
        }
    }
}

/// Deduplication batch run events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeduplicationEvent {
    RunStarted {
        run_id: Uuid,
        batch_size: usize,
        started_at: DateTime<Utc>,
    },
    PatternFailed {
        run_id: Uuid,
        pattern_id: PatternId,
        trace_id: TraceId,
        error: String,
        failed_at: DateTime<Utc>,
    },
    RunCompleted {
        run_id: Uuid,
        patterns_processed: usize,
        suggestions_created: usize,
        suggestions_merged: usize,
        patterns_errored: usize,
        finished_at: DateTime<Utc>,
    },
}
