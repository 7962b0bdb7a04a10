// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use remedy_core::application::deduplication::DeduplicationOrchestrator;
use remedy_core::application::lifecycle::StandardLifecycleService;
use remedy_core::application::review::ReviewQueries;
use remedy_core::domain::embedding::{Embedding, EmbeddingError, EmbeddingProvider};
use remedy_core::domain::notification::{NotificationError, Notifier, ReviewNotification};
use remedy_core::domain::similarity::SimilarityMatcher;
use remedy_core::infrastructure::event_bus::EventBus;
use remedy_core::infrastructure::repositories::{
    InMemoryFailurePatternRepository, InMemorySuggestionRepository,
};

/// Returns the vector registered for an exact embedding text.
#[derive(Default)]
pub struct ScriptedEmbedder {
    vectors: Mutex<HashMap<String, Embedding>>,
    dimension: usize,
}

impl ScriptedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: Mutex::new(HashMap::new()),
            dimension,
        }
    }

    /// Register the vector for `"{failure_type}: {trigger_condition}"`.
    pub fn register(&self, failure_type: &str, trigger: &str, vector: Vec<f32>) {
        self.vectors
            .lock()
            .insert(format!("{}: {}", failure_type, trigger), vector);
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn name(&self) -> &str {
        "scripted"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.vectors
            .lock()
            .get(text)
            .cloned()
            .ok_or_else(|| EmbeddingError::Unavailable(format!("no scripted vector for '{}'", text)))
    }
}

/// Collects notifications instead of delivering them.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<ReviewNotification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &ReviewNotification) -> Result<(), NotificationError> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

/// Fully wired in-memory stack.
pub struct Stack {
    pub patterns: InMemoryFailurePatternRepository,
    pub suggestions: InMemorySuggestionRepository,
    pub embedder: Arc<ScriptedEmbedder>,
    pub notifier: Arc<RecordingNotifier>,
    pub event_bus: Arc<EventBus>,
    pub orchestrator: Arc<DeduplicationOrchestrator>,
    pub lifecycle: Arc<StandardLifecycleService>,
    pub review: Arc<ReviewQueries>,
}

pub fn stack(threshold: f32) -> Stack {
    let patterns = InMemoryFailurePatternRepository::new();
    let suggestions = InMemorySuggestionRepository::new(patterns.clone());
    let embedder = Arc::new(ScriptedEmbedder::new(2));
    let notifier = Arc::new(RecordingNotifier::default());
    let event_bus = Arc::new(EventBus::new(256));

    let orchestrator = Arc::new(DeduplicationOrchestrator::new(
        Arc::new(patterns.clone()),
        Arc::new(suggestions.clone()),
        embedder.clone(),
        SimilarityMatcher::new(threshold),
        event_bus.clone(),
    ));
    let lifecycle = Arc::new(StandardLifecycleService::new(
        Arc::new(suggestions.clone()),
        notifier.clone(),
        event_bus.clone(),
    ));
    let review = Arc::new(ReviewQueries::new(Arc::new(suggestions.clone())));

    Stack {
        patterns,
        suggestions,
        embedder,
        notifier,
        event_bus,
        orchestrator,
        lifecycle,
        review,
    }
}
