// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding
//!
//! Domain interface for the embedding model (Anti-Corruption Layer).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Isolates deduplication from vendor embedding APIs
//!
//! Implementations live in `crate::infrastructure::embedding`.

use std::time::Duration;

use async_trait::async_trait;

/// Dense embedding vector.
pub type Embedding = Vec<f32>;

/// Default embedding dimension when the configuration does not set one.
pub const DEFAULT_DIMENSION: usize = 768;

/// Domain interface for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name for logging (e.g., "openai", "ollama")
    fn name(&self) -> &str;

    /// Dimension of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;
}

/// Errors that can occur while producing embeddings
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded")]
    RateLimit { retry_after: Option<Duration> },

    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Embedding failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<EmbeddingError> },
}

impl EmbeddingError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Network(_)
                | EmbeddingError::RateLimit { .. }
                | EmbeddingError::Timeout(_)
                | EmbeddingError::Unavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(EmbeddingError::Network("reset".into()).is_transient());
        assert!(EmbeddingError::RateLimit { retry_after: None }.is_transient());
        assert!(EmbeddingError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(EmbeddingError::Unavailable("503".into()).is_transient());

        assert!(!EmbeddingError::Authentication("bad key".into()).is_transient());
        assert!(!EmbeddingError::DimensionMismatch { expected: 768, actual: 3 }.is_transient());
        assert!(!EmbeddingError::RetriesExhausted {
            attempts: 3,
            last: Box::new(EmbeddingError::Timeout(Duration::from_secs(1))),
        }
        .is_transient());
    }
}
