// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that can be
//! injected into all PostgreSQL repository implementations. Schema lives in
//! `core/migrations` and is embedded at compile time.

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::domain::repository::PostgresConfig;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Apply pending migrations; returns how many were applied.
    pub async fn migrate(&self) -> Result<usize> {
        let applied_before = self.applied_migrations().await;
        MIGRATOR
            .run(&self.pool)
            .await
            .context("Failed to apply migrations")?;
        let applied = self.applied_migrations().await.saturating_sub(applied_before);
        if applied > 0 {
            info!(applied, "Database migrations applied");
        }
        Ok(applied)
    }

    /// Number of migrations recorded as applied (0 on a fresh database).
    pub async fn applied_migrations(&self) -> usize {
        sqlx::query("SELECT version FROM _sqlx_migrations")
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    pub fn available_migrations() -> usize {
        MIGRATOR.iter().count()
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}
