// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Embedding Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Vendor adapters translate between the domain EmbeddingProvider interface and
// external APIs. Decorators add the per-call timeout, bounded exponential
// backoff and best-effort in-process memoization.

pub mod cache;
pub mod ollama;
pub mod openai;
pub mod resilient;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;

use crate::domain::config::{resolve_secret, EmbeddingConfig, EmbeddingProviderKind};
use crate::domain::embedding::{EmbeddingError, EmbeddingProvider};

pub use cache::CachedEmbeddingProvider;
pub use ollama::OllamaEmbeddingAdapter;
pub use openai::OpenAIEmbeddingAdapter;
pub use resilient::ResilientEmbeddingProvider;

/// Build the provider stack described by the configuration:
/// adapter → timeout/retry → cache.
pub fn build_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let adapter: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::OpenAI => {
            let api_key = config
                .api_key
                .as_deref()
                .and_then(resolve_secret)
                .ok_or_else(|| anyhow::anyhow!("spec.embedding.api_key is required for openai"))?;
            Arc::new(OpenAIEmbeddingAdapter::new(
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
                config.dimension,
            ))
        }
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbeddingAdapter::new(
            config.endpoint.clone(),
            config.model.clone(),
            config.dimension,
        )),
    };

    let resilient: Arc<dyn EmbeddingProvider> = Arc::new(ResilientEmbeddingProvider::new(
        adapter,
        config.retry.clone(),
        Duration::from_millis(config.timeout_ms),
    ));

    if config.cache_capacity == 0 {
        return Ok(resilient);
    }

    Ok(Arc::new(CachedEmbeddingProvider::new(resilient, config.cache_capacity)))
}

/// Map a non-success HTTP status to the domain error taxonomy.
fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: String) -> EmbeddingError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => EmbeddingError::RateLimit { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EmbeddingError::Authentication(body),
        StatusCode::REQUEST_TIMEOUT => EmbeddingError::Unavailable(format!("HTTP {}: {}", status, body)),
        s if s.is_server_error() => EmbeddingError::Unavailable(format!("HTTP {}: {}", status, body)),
        _ => EmbeddingError::Provider(format!("HTTP {}: {}", status, body)),
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn check_dimension(expected: usize, embedding: &[f32]) -> Result<(), EmbeddingError> {
    if embedding.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}
