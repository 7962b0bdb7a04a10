// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Service wiring
//!
//! Builds the repositories, embedding stack, orchestrator and review
//! services described by a [`RemedyConfigManifest`]. Every command goes
//! through [`build_services`] so the server and one-shot commands see the
//! same stack.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use remedy_core::application::deduplication::DeduplicationOrchestrator;
use remedy_core::application::lifecycle::StandardLifecycleService;
use remedy_core::application::repository_factory::{create_repositories, Repositories};
use remedy_core::application::review::ReviewQueries;
use remedy_core::domain::config::RemedyConfigManifest;
use remedy_core::domain::notification::Notifier;
use remedy_core::domain::repository::StorageBackend;
use remedy_core::domain::similarity::SimilarityMatcher;
use remedy_core::infrastructure::embedding::build_embedding_provider;
use remedy_core::infrastructure::event_bus::EventBus;
use remedy_core::infrastructure::{LogNotifier, WebhookNotifier};

pub struct Services {
    pub repositories: Repositories,
    pub event_bus: Arc<EventBus>,
    pub orchestrator: Arc<DeduplicationOrchestrator>,
    pub lifecycle: Arc<StandardLifecycleService>,
    pub review: Arc<ReviewQueries>,
    /// True when state lives only in this process
    pub ephemeral: bool,
}

/// Load, env-override and validate the configuration.
pub fn load_config(config_path: Option<std::path::PathBuf>) -> Result<RemedyConfigManifest> {
    let config =
        RemedyConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

pub async fn build_services(config: &RemedyConfigManifest) -> Result<Services> {
    let backend = config.storage_backend()?;
    let ephemeral = matches!(backend, StorageBackend::InMemory);
    let repositories = create_repositories(&backend, &config.spec.storage)
        .await
        .context("Failed to initialize storage")?;

    let embedder = build_embedding_provider(&config.spec.embedding)
        .context("Failed to initialize embedding provider")?;
    info!(
        provider = embedder.name(),
        dimension = embedder.dimension(),
        "Embedding provider ready"
    );

    let event_bus = Arc::new(EventBus::with_default_capacity());
    let matcher = SimilarityMatcher::new(config.spec.deduplication.similarity_threshold);

    let orchestrator = Arc::new(DeduplicationOrchestrator::new(
        repositories.patterns.clone(),
        repositories.suggestions.clone(),
        embedder,
        matcher,
        event_bus.clone(),
    ));
    let lifecycle = Arc::new(StandardLifecycleService::new(
        repositories.suggestions.clone(),
        build_notifier(config)?,
        event_bus.clone(),
    ));
    let review = Arc::new(ReviewQueries::new(repositories.suggestions.clone()));

    Ok(Services {
        repositories,
        event_bus,
        orchestrator,
        lifecycle,
        review,
        ephemeral,
    })
}

fn build_notifier(config: &RemedyConfigManifest) -> Result<Arc<dyn Notifier>> {
    let webhook = config
        .spec
        .notifications
        .as_ref()
        .and_then(|n| n.webhook_url.clone().map(|url| (url, n.timeout_ms)));

    match webhook {
        Some((url, timeout_ms)) => {
            let notifier = WebhookNotifier::new(url, Duration::from_millis(timeout_ms))
                .context("Failed to build webhook notifier")?;
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LogNotifier::default())),
    }
}

/// Warn when a one-shot command runs against process-local storage.
pub fn warn_if_ephemeral(services: &Services, command: &str) {
    if services.ephemeral {
        warn!(
            command,
            "Using the in-memory backend; results are discarded when this command exits"
        );
    }
}
