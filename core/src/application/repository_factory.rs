// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on the storage backend
//! configuration, keeping the domain layer free of infrastructure types.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::domain::config::StorageConfig;
use crate::domain::repository::{FailurePatternRepository, StorageBackend, SuggestionRepository};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{
    InMemoryFailurePatternRepository, InMemorySuggestionRepository,
    PostgresFailurePatternRepository, PostgresSuggestionRepository,
};

/// The pair of repositories every service is wired against.
#[derive(Clone)]
pub struct Repositories {
    pub suggestions: Arc<dyn SuggestionRepository>,
    pub patterns: Arc<dyn FailurePatternRepository>,
    /// Present for the PostgreSQL backend
    pub database: Option<Database>,
}

/// Build repositories for `backend`. PostgreSQL connects and applies
/// pending migrations before returning.
pub async fn create_repositories(
    backend: &StorageBackend,
    storage: &StorageConfig,
) -> Result<Repositories> {
    match backend {
        StorageBackend::InMemory => {
            info!("Using in-memory repositories (state is lost on exit)");
            let patterns = InMemoryFailurePatternRepository::new();
            let suggestions = InMemorySuggestionRepository::new(patterns.clone())
                .with_max_attempts(storage.transaction_max_attempts);
            Ok(Repositories {
                suggestions: Arc::new(suggestions),
                patterns: Arc::new(patterns),
                database: None,
            })
        }
        StorageBackend::PostgreSQL(config) => {
            let database = Database::new(config).await?;
            database.migrate().await?;
            info!("Using PostgreSQL repositories");

            let pool = database.get_pool().clone();
            let suggestions = PostgresSuggestionRepository::new(pool.clone())
                .with_max_attempts(storage.transaction_max_attempts)
                .with_transaction_timeout(Duration::from_millis(storage.transaction_timeout_ms));
            Ok(Repositories {
                suggestions: Arc::new(suggestions),
                patterns: Arc::new(PostgresFailurePatternRepository::new(pool)),
                database: Some(database),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_backend_needs_no_database() {
        let repos = create_repositories(&StorageBackend::InMemory, &StorageConfig::default())
            .await
            .unwrap();
        assert!(repos.database.is_none());
        assert!(repos.suggestions.match_snapshot().await.unwrap().is_empty());
        assert!(repos.patterns.fetch_unprocessed(10).await.unwrap().is_empty());
    }
}
