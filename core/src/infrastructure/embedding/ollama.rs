// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama Embedding Provider Adapter
//
// Anti-Corruption Layer for Ollama local embedding models
// Supports air-gapped deployments

use crate::domain::embedding::{Embedding, EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_dimension, classify_status, retry_after};

pub struct OllamaEmbeddingAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbeddingAdapter {
    pub fn new(endpoint: String, model: String, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let url = format!("{}/api/embeddings", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let wait = retry_after(response.headers());
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 404 {
                EmbeddingError::Provider(format!("Model not found: {}", self.model))
            } else {
                classify_status(status, wait, error_text)
            });
        }

        let body: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if body.embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse("Empty embedding".to_string()));
        }

        check_dimension(self.dimension, &body.embedding)?;
        Ok(body.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_against_local_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embeddings")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "nomic-embed-text",
                "prompt": "timeout: tool call exceeded 30s",
            })))
            .with_status(200)
            .with_body(r#"{"embedding":[0.5,0.5]}"#)
            .create_async()
            .await;

        let adapter = OllamaEmbeddingAdapter::new(server.url(), "nomic-embed-text".into(), 2);
        let embedding = adapter.embed("timeout: tool call exceeded 30s").await.unwrap();

        assert_eq!(embedding, vec![0.5, 0.5]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embeddings")
            .with_status(503)
            .with_body("loading model")
            .create_async()
            .await;

        let adapter = OllamaEmbeddingAdapter::new(server.url(), "m".into(), 2);
        let err = adapter.embed("x").await.unwrap_err();
        assert!(err.is_transient());
    }
}
