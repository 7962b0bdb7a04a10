// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Failure Patterns (upstream input)
//!
//! A [`FailurePattern`] is a single-trace description of a failure emitted by
//! the upstream extraction stage. This crate only reads patterns and flips
//! their `processed` flag once they have been durably merged into, or have
//! founded, a suggestion.
//!
//! The free-form `failure_type` string is parsed into a closed
//! [`FailureCategory`], and [`FailureCategory::suggestion_type`] is the single
//! lookup table deciding which kind of remediation a new suggestion carries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::suggestion::{Severity, SuggestionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the observability trace a pattern was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of failure categories reported by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Hallucination,
    ToolError,
    RetrievalFailure,
    FormatViolation,
    SafetyViolation,
    PolicyViolation,
    Timeout,
    ReasoningError,
    InstructionFollowing,
    Other,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 10] = [
        FailureCategory::Hallucination,
        FailureCategory::ToolError,
        FailureCategory::RetrievalFailure,
        FailureCategory::FormatViolation,
        FailureCategory::SafetyViolation,
        FailureCategory::PolicyViolation,
        FailureCategory::Timeout,
        FailureCategory::ReasoningError,
        FailureCategory::InstructionFollowing,
        FailureCategory::Other,
    ];

    /// Parse an extractor category label. Unknown labels fall back to `Other`.
    pub fn parse(label: &str) -> Self {
        let normalized: String = label
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "hallucination" => FailureCategory::Hallucination,
            "tool_error" | "tool_failure" => FailureCategory::ToolError,
            "retrieval_failure" | "retrieval_error" => FailureCategory::RetrievalFailure,
            "format_violation" | "format_error" => FailureCategory::FormatViolation,
            "safety_violation" => FailureCategory::SafetyViolation,
            "policy_violation" => FailureCategory::PolicyViolation,
            "timeout" => FailureCategory::Timeout,
            "reasoning_error" => FailureCategory::ReasoningError,
            "instruction_following" => FailureCategory::InstructionFollowing,
            _ => FailureCategory::Other,
        }
    }

    /// Which remediation a suggestion founded by this category will carry.
    pub fn suggestion_type(self) -> SuggestionType {
        match self {
            FailureCategory::SafetyViolation
            | FailureCategory::PolicyViolation
            | FailureCategory::FormatViolation => SuggestionType::Guardrail,
            FailureCategory::ToolError | FailureCategory::Timeout => SuggestionType::Runbook,
            FailureCategory::Hallucination
            | FailureCategory::RetrievalFailure
            | FailureCategory::ReasoningError
            | FailureCategory::InstructionFollowing
            | FailureCategory::Other => SuggestionType::Eval,
        }
    }
}

impl FromStr for FailureCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Upstream-extracted failure pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailurePattern {
    pub pattern_id: PatternId,
    pub trace_id: TraceId,
    pub failure_type: String,
    pub trigger_condition: String,
    pub title: String,
    pub summary: String,
    pub confidence: f64,
    #[serde(default)]
    pub severity: Severity,
    pub extracted_at: DateTime<Utc>,
    /// Set once the pattern has left the deduplication queue: in the same commit
    /// that founds or extends a suggestion, or when it is rejected as malformed.
    /// A malformed pattern is therefore processed without any suggestion holding
    /// its trace; the run that dropped it reports it under `patterns_errored`.
    #[serde(default)]
    pub processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Malformed pattern {pattern_id}: {reason}")]
    Malformed { pattern_id: PatternId, reason: String },
}

impl FailurePattern {
    pub fn new(
        trace_id: impl Into<String>,
        failure_type: impl Into<String>,
        trigger_condition: impl Into<String>,
    ) -> Self {
        Self {
            pattern_id: PatternId::new(),
            trace_id: TraceId::new(trace_id),
            failure_type: failure_type.into(),
            trigger_condition: trigger_condition.into(),
            title: String::new(),
            summary: String::new(),
            confidence: 1.0,
            severity: Severity::default(),
            extracted_at: Utc::now(),
            processed: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_extracted_at(mut self, extracted_at: DateTime<Utc>) -> Self {
        self.extracted_at = extracted_at;
        self
    }

    pub fn category(&self) -> FailureCategory {
        FailureCategory::parse(&self.failure_type)
    }

    /// Text handed to the embedding provider. Identical inputs always yield
    /// identical text so their vectors are comparable.
    pub fn embedding_text(&self) -> String {
        format!(
            "{}: {}",
            self.failure_type.trim(),
            self.trigger_condition.trim()
        )
    }

    /// Reject patterns the extractor emitted without the fields matching needs.
    pub fn validate(&self) -> Result<(), PatternError> {
        let malformed = |reason: &str| PatternError::Malformed {
            pattern_id: self.pattern_id,
            reason: reason.to_string(),
        };

        if self.trace_id.as_str().trim().is_empty() {
            return Err(malformed("trace_id is empty"));
        }
        if self.failure_type.trim().is_empty() {
            return Err(malformed("failure_type is empty"));
        }
        if self.trigger_condition.trim().is_empty() {
            return Err(malformed("trigger_condition is empty"));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(malformed("confidence must lie within [0, 1]"));
        }
        Ok(())
    }
}
