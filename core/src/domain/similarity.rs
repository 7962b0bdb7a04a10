// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Similarity Matcher
//!
//! Pure functions deciding whether a new pattern's embedding is a
//! near-duplicate of an existing suggestion. No store or network access:
//! callers pass an explicit snapshot of [`MatchCandidate`]s.
//!
//! The threshold boundary is inclusive: a candidate scoring exactly the
//! configured threshold is a match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::suggestion::{Suggestion, SuggestionId};

/// The comparison key of an existing suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub suggestion_id: SuggestionId,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl From<&Suggestion> for MatchCandidate {
    fn from(suggestion: &Suggestion) -> Self {
        Self {
            suggestion_id: suggestion.id(),
            embedding: suggestion.embedding().to_vec(),
            created_at: suggestion.created_at(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub suggestion_id: SuggestionId,
    pub score: f32,
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Zero-norm vectors and vectors of different length score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// Linear scan for the best-scoring suggestion at or above `threshold`.
///
/// Ties on score go to the earlier `created_at` (then the lower id, so the
/// outcome never depends on snapshot order). Zero vectors, dimension
/// mismatches and non-finite scores never match.
pub fn find_best_match(
    candidate: &[f32],
    existing: &[MatchCandidate],
    threshold: f32,
) -> Option<SimilarityMatch> {
    if candidate.is_empty() || is_zero_vector(candidate) {
        return None;
    }

    let mut best: Option<(&MatchCandidate, f32)> = None;

    for entry in existing {
        if entry.embedding.len() != candidate.len() || is_zero_vector(&entry.embedding) {
            continue;
        }

        let score = cosine_similarity(candidate, &entry.embedding);
        if !score.is_finite() {
            continue;
        }

        let replaces = match best {
            None => true,
            Some((current, current_score)) => {
                score > current_score
                    || (score == current_score
                        && (entry.created_at, entry.suggestion_id)
                            < (current.created_at, current.suggestion_id))
            }
        };

        if replaces {
            best = Some((entry, score));
        }
    }

    best.filter(|(_, score)| *score >= threshold)
        .map(|(entry, score)| SimilarityMatch {
            suggestion_id: entry.suggestion_id,
            score,
        })
}

/// Matcher bound to the configured threshold.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityMatcher {
    threshold: f32,
}

impl SimilarityMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn find_best_match(
        &self,
        candidate: &[f32],
        existing: &[MatchCandidate],
    ) -> Option<SimilarityMatch> {
        find_best_match(candidate, existing, self.threshold)
    }
}
