// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI Embedding Provider Adapter
//
// Anti-Corruption Layer for the OpenAI `/embeddings` API.
// Also works with OpenAI-compatible servers (vLLM, LM Studio, etc.)

use crate::domain::embedding::{Embedding, EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_dimension, classify_status, retry_after};

pub struct OpenAIEmbeddingAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAIEmbeddingAdapter {
    pub fn new(endpoint: String, api_key: String, model: String, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let request = OpenAIEmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let url = format!("{}/embeddings", self.endpoint.trim_end_matches('/'));
        debug!("Requesting embedding from {} (model: {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let wait = retry_after(response.headers());
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, wait, error_text));
        }

        let body: OpenAIEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))?;

        check_dimension(self.dimension, &embedding)?;
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_parses_first_vector() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"embedding":[0.1,0.2,0.3],"index":0}],"model":"m"}"#)
            .create_async()
            .await;

        let adapter = OpenAIEmbeddingAdapter::new(server.url(), "sk-test".into(), "m".into(), 3);
        let embedding = adapter.embed("hallucination: missing citation").await.unwrap();

        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(429)
            .with_header("retry-after", "3")
            .create_async()
            .await;

        let adapter = OpenAIEmbeddingAdapter::new(server.url(), "k".into(), "m".into(), 3);
        let err = adapter.embed("x").await.unwrap_err();

        assert!(matches!(
            err,
            EmbeddingError::RateLimit { retry_after: Some(d) } if d.as_secs() == 3
        ));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[1.0,0.0]}]}"#)
            .create_async()
            .await;

        let adapter = OpenAIEmbeddingAdapter::new(server.url(), "k".into(), "m".into(), 768);
        let err = adapter.embed("x").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { expected: 768, actual: 2 }));
    }
}
