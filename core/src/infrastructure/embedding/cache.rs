// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Cached Embedding Provider
//
// Best-effort in-process memoization keyed by the exact input text. Entries
// are evicted least-recently-used; failures are never cached.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use crate::domain::embedding::{Embedding, EmbeddingError, EmbeddingProvider};

pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Embedding>>,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let cached = self.cache.lock().get(text).cloned();
        if let Some(hit) = cached {
            metrics::counter!("remedy_embedding_cache_hits_total").increment(1);
            return Ok(hit);
        }

        // Lock is not held across the provider call
        let embedding = self.inner.embed(text).await?;
        self.cache.lock().put(text.to_string(), embedding.clone());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            1
        }

        async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EmbeddingError::Unavailable("down".into()));
            }
            Ok(vec![text.len() as f32])
        }
    }

    #[tokio::test]
    async fn test_repeated_text_hits_cache() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let cached = CachedEmbeddingProvider::new(inner.clone(), 8);

        let first = cached.embed("timeout: slow tool").await.unwrap();
        let second = cached.embed("timeout: slow tool").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let cached = CachedEmbeddingProvider::new(inner.clone(), 2);

        cached.embed("a").await.unwrap();
        cached.embed("bb").await.unwrap();
        cached.embed("ccc").await.unwrap();
        cached.embed("a").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 4);
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
            fail: true,
        });
        let cached = CachedEmbeddingProvider::new(inner.clone(), 8);

        assert!(cached.embed("x").await.is_err());
        assert!(cached.embed("x").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.is_empty());
    }
}
