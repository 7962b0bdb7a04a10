// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Resilient Embedding Provider
//
// Bounds every embedding call with a timeout and retries transient failures
// with exponential backoff. Non-transient errors surface immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::config::RetryConfig;
use crate::domain::embedding::{Embedding, EmbeddingError, EmbeddingProvider};

pub struct ResilientEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    retry: RetryConfig,
    timeout: Duration,
}

impl ResilientEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, retry: RetryConfig, timeout: Duration) -> Self {
        Self {
            inner,
            retry,
            timeout,
        }
    }

    async fn attempt(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        match tokio::time::timeout(self.timeout, self.inner.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout(self.timeout)),
        }
    }

    fn backoff(&self, retry: u32, error: &EmbeddingError) -> Duration {
        let ceiling = Duration::from_millis(self.retry.max_delay_ms);
        match error {
            EmbeddingError::RateLimit {
                retry_after: Some(wait),
            } => (*wait).min(ceiling),
            _ => self.retry.delay_for(retry),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ResilientEmbeddingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(text).await {
                Ok(embedding) => {
                    if attempt > 1 {
                        debug!(provider = self.inner.name(), attempt, "Embedding succeeded after retry");
                    }
                    return Ok(embedding);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    return Err(EmbeddingError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.backoff(attempt, &e);
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient embedding failure, backing off"
                    );
                    metrics::counter!("remedy_embedding_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
