// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Suggestion Aggregate
//!
//! A [`Suggestion`] is the deduplicated, reviewable unit of work representing
//! one or more failure patterns judged to be the same underlying issue.
//!
//! ## Invariants
//!
//! - `source_traces` is append-only, never empty, and never holds the same
//!   trace id twice.
//! - `status` moves only `pending → approved` or `pending → rejected`; both
//!   are terminal.
//! - `embedding` and `pattern_summary` are written once, when the suggestion
//!   is founded.
//! - `version_history` is never empty and its last entry's `new_status`
//!   equals the current `status`.
//!
//! The aggregate enforces these locally; the repository layer is responsible
//! for applying the resulting state atomically.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pattern::{FailureCategory, FailurePattern, PatternId, TraceId};

/// Actor recorded on entries written by the deduplication pipeline.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuggestionId(pub Uuid);

impl SuggestionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SuggestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SuggestionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Unknown enum label supplied by a client or read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($label => Ok($name::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

/// Remediation kind the suggestion will eventually carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Eval,
    Guardrail,
    Runbook,
}

string_enum!(SuggestionType, "suggestion type", {
    Eval => "eval",
    Guardrail => "guardrail",
    Runbook => "runbook",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(SuggestionStatus, "suggestion status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl SuggestionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

string_enum!(Severity, "severity", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

/// Snapshot of the founding pattern, kept as the suggestion's display content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSummary {
    pub failure_category: FailureCategory,
    pub trigger_description: String,
    pub title: String,
    pub summary: String,
}

impl PatternSummary {
    fn of(pattern: &FailurePattern) -> Self {
        Self {
            failure_category: pattern.category(),
            trigger_description: pattern.trigger_condition.trim().to_string(),
            title: pattern.title.clone(),
            summary: pattern.summary.clone(),
        }
    }
}

/// One contributing pattern. `similarity_score` is `None` for the founding entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTrace {
    pub trace_id: TraceId,
    pub pattern_id: PatternId,
    pub added_at: DateTime<Utc>,
    pub similarity_score: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

string_enum!(ReviewAction, "review action", {
    Approve => "approve",
    Reject => "reject",
});

impl ReviewAction {
    pub fn target_status(&self) -> SuggestionStatus {
        match self {
            ReviewAction::Approve => SuggestionStatus::Approved,
            ReviewAction::Reject => SuggestionStatus::Rejected,
        }
    }
}

/// Terminal review decision, written exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalMetadata {
    pub actor: String,
    pub action: ReviewAction,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistoryEntry {
    pub previous_status: Option<SuggestionStatus>,
    pub new_status: SuggestionStatus,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Result of a successful status transition, returned to reviewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub suggestion_id: SuggestionId,
    pub previous_status: SuggestionStatus,
    pub new_status: SuggestionStatus,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuggestionError {
    #[error("Suggestion already decided (status: {status})")]
    AlreadyDecided { status: SuggestionStatus },

    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition {
        from: SuggestionStatus,
        to: SuggestionStatus,
    },
}

/// Current time at the microsecond precision Postgres keeps, so a timestamp
/// reads back exactly as it was written.
fn stored_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub(crate) id: SuggestionId,
    #[serde(rename = "type")]
    pub(crate) suggestion_type: SuggestionType,
    pub(crate) status: SuggestionStatus,
    pub(crate) severity: Severity,
    pub(crate) embedding: Vec<f32>,
    pub(crate) pattern_summary: PatternSummary,
    pub(crate) source_traces: Vec<SourceTrace>,
    pub(crate) approval_metadata: Option<ApprovalMetadata>,
    pub(crate) version_history: Vec<VersionHistoryEntry>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token, bumped on every mutation.
    pub(crate) revision: u64,
}

impl Suggestion {
    /// Found a new pending suggestion from its first pattern.
    pub fn found(pattern: &FailurePattern, embedding: Vec<f32>) -> Self {
        let now = stored_now();
        Self {
            id: SuggestionId::new(),
            suggestion_type: pattern.category().suggestion_type(),
            status: SuggestionStatus::Pending,
            severity: pattern.severity,
            embedding,
            pattern_summary: PatternSummary::of(pattern),
            source_traces: vec![SourceTrace {
                trace_id: pattern.trace_id.clone(),
                pattern_id: pattern.pattern_id,
                added_at: now,
                similarity_score: None,
            }],
            approval_metadata: None,
            version_history: vec![VersionHistoryEntry {
                previous_status: None,
                new_status: SuggestionStatus::Pending,
                actor: SYSTEM_ACTOR.to_string(),
                timestamp: now,
                notes: Some(format!("Founded from pattern {}", pattern.pattern_id)),
            }],
            created_at: now,
            updated_at: now,
            revision: 1,
        }
    }

    pub fn id(&self) -> SuggestionId {
        self.id
    }

    pub fn suggestion_type(&self) -> SuggestionType {
        self.suggestion_type
    }

    pub fn status(&self) -> SuggestionStatus {
        self.status
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn pattern_summary(&self) -> &PatternSummary {
        &self.pattern_summary
    }

    pub fn source_traces(&self) -> &[SourceTrace] {
        &self.source_traces
    }

    pub fn approval_metadata(&self) -> Option<&ApprovalMetadata> {
        self.approval_metadata.as_ref()
    }

    pub fn version_history(&self) -> &[VersionHistoryEntry] {
        &self.version_history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contains_trace(&self, trace_id: &TraceId) -> bool {
        self.source_traces.iter().any(|t| &t.trace_id == trace_id)
    }

    /// Append a merged pattern's trace. Returns `false` (and changes nothing)
    /// when the trace is already present, so replays are no-ops.
    pub fn absorb(&mut self, pattern: &FailurePattern, similarity_score: f32) -> bool {
        if self.contains_trace(&pattern.trace_id) {
            return false;
        }

        let now = stored_now();
        self.source_traces.push(SourceTrace {
            trace_id: pattern.trace_id.clone(),
            pattern_id: pattern.pattern_id,
            added_at: now,
            similarity_score: Some(similarity_score),
        });
        self.updated_at = now;
        self.revision += 1;
        true
    }

    /// Apply the single terminal review decision.
    pub fn transition_to(
        &mut self,
        new_status: SuggestionStatus,
        actor: &str,
        notes: Option<String>,
    ) -> Result<TransitionRecord, SuggestionError> {
        if self.status.is_terminal() {
            return Err(SuggestionError::AlreadyDecided {
                status: self.status,
            });
        }

        let action = match new_status {
            SuggestionStatus::Approved => ReviewAction::Approve,
            SuggestionStatus::Rejected => ReviewAction::Reject,
            SuggestionStatus::Pending => {
                return Err(SuggestionError::IllegalTransition {
                    from: self.status,
                    to: new_status,
                })
            }
        };

        let now = stored_now();
        let previous_status = self.status;

        self.version_history.push(VersionHistoryEntry {
            previous_status: Some(previous_status),
            new_status,
            actor: actor.to_string(),
            timestamp: now,
            notes: notes.clone(),
        });
        self.approval_metadata = Some(ApprovalMetadata {
            actor: actor.to_string(),
            action,
            notes,
            timestamp: now,
        });
        self.status = new_status;
        self.updated_at = now;
        self.revision += 1;

        Ok(TransitionRecord {
            suggestion_id: self.id,
            previous_status,
            new_status,
            actor: actor.to_string(),
            timestamp: now,
        })
    }

    /// Audit trail agrees with the current state.
    pub fn audit_consistent(&self) -> bool {
        let history_ok = self
            .version_history
            .last()
            .is_some_and(|entry| entry.new_status == self.status);
        let founding_ok = self
            .version_history
            .first()
            .is_some_and(|entry| entry.previous_status.is_none());
        let decision_ok = self.status.is_terminal() == self.approval_metadata.is_some();

        history_ok && founding_ok && decision_ok && !self.source_traces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(trace: &str) -> FailurePattern {
        FailurePattern::new(trace, "hallucination", "missing citation")
            .with_title("Cites nonexistent paper")
            .with_severity(Severity::High)
    }

    #[test]
    fn test_found_suggestion_is_pending_with_single_entries() {
        let suggestion = Suggestion::found(&pattern("t-1"), vec![1.0, 0.0]);

        assert_eq!(suggestion.status(), SuggestionStatus::Pending);
        assert_eq!(suggestion.suggestion_type(), SuggestionType::Eval);
        assert_eq!(suggestion.severity(), Severity::High);
        assert_eq!(suggestion.source_traces().len(), 1);
        assert_eq!(suggestion.source_traces()[0].similarity_score, None);
        assert_eq!(suggestion.version_history().len(), 1);
        assert_eq!(suggestion.version_history()[0].previous_status, None);
        assert_eq!(suggestion.version_history()[0].actor, SYSTEM_ACTOR);
        assert!(suggestion.audit_consistent());
    }

    #[test]
    fn test_absorb_is_idempotent_per_trace() {
        let mut suggestion = Suggestion::found(&pattern("t-1"), vec![1.0, 0.0]);
        let summary = suggestion.pattern_summary().clone();
        let created_at = suggestion.created_at();
        assert_eq!(suggestion.updated_at(), created_at);

        let other = FailurePattern::new("t-2", "tool_error", "different wording")
            .with_severity(Severity::Low);
        assert!(suggestion.absorb(&other, 0.9));
        let merged_at = suggestion.updated_at();
        assert_eq!(merged_at, suggestion.source_traces()[1].added_at);
        assert!(merged_at >= created_at);

        assert!(!suggestion.absorb(&other, 0.9));
        assert!(!suggestion.absorb(&pattern("t-1"), 1.0));
        assert_eq!(suggestion.updated_at(), merged_at);
        assert_eq!(suggestion.created_at(), created_at);

        assert_eq!(suggestion.source_traces().len(), 2);
        assert_eq!(suggestion.source_traces()[1].similarity_score, Some(0.9));
        // merge never touches the founding snapshot or severity
        assert_eq!(suggestion.pattern_summary(), &summary);
        assert_eq!(suggestion.severity(), Severity::High);
        assert_eq!(suggestion.revision(), 2);
    }

    #[test]
    fn test_transition_is_one_way() {
        let mut suggestion = Suggestion::found(&pattern("t-1"), vec![1.0]);
        let created_at = suggestion.created_at();

        let record = suggestion
            .transition_to(SuggestionStatus::Approved, "alice", Some("ship it".into()))
            .unwrap();
        let decided_at = suggestion.updated_at();
        assert_eq!(decided_at, record.timestamp);
        assert!(decided_at >= created_at);
        assert_eq!(suggestion.created_at(), created_at);
        assert_eq!(record.previous_status, SuggestionStatus::Pending);
        assert_eq!(record.new_status, SuggestionStatus::Approved);
        assert_eq!(suggestion.version_history().len(), 2);
        assert_eq!(
            suggestion.approval_metadata().map(|m| m.action),
            Some(ReviewAction::Approve)
        );
        assert!(suggestion.audit_consistent());

        for target in [
            SuggestionStatus::Approved,
            SuggestionStatus::Rejected,
            SuggestionStatus::Pending,
        ] {
            let err = suggestion.transition_to(target, "bob", None).unwrap_err();
            assert_eq!(
                err,
                SuggestionError::AlreadyDecided {
                    status: SuggestionStatus::Approved
                }
            );
        }
        assert_eq!(suggestion.version_history().len(), 2);
        assert_eq!(suggestion.updated_at(), decided_at);
        assert_eq!(suggestion.revision(), 2);
    }

    #[test]
    fn test_pending_to_pending_is_illegal() {
        let mut suggestion = Suggestion::found(&pattern("t-1"), vec![1.0]);
        let err = suggestion
            .transition_to(SuggestionStatus::Pending, "alice", None)
            .unwrap_err();
        assert!(matches!(err, SuggestionError::IllegalTransition { .. }));
        assert_eq!(suggestion.version_history().len(), 1);
        assert_eq!(suggestion.revision(), 1);
    }

    #[test]
    fn test_enum_labels_parse_back() {
        assert_eq!("Guardrail".parse::<SuggestionType>().unwrap(), SuggestionType::Guardrail);
        assert_eq!("rejected".parse::<SuggestionStatus>().unwrap(), SuggestionStatus::Rejected);
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("urgent".parse::<Severity>().is_err());
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn test_json_shape() {
        let suggestion = Suggestion::found(&pattern("t-1"), vec![0.5]);
        let json = serde_json::to_value(&suggestion).unwrap();
        assert_eq!(json["type"], "eval");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["sourceTraces"][0]["similarityScore"], serde_json::Value::Null);
        assert_eq!(json["versionHistory"][0]["previousStatus"], serde_json::Value::Null);
    }
}
