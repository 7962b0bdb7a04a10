// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Migrate Command
//!
//! `remedy migrate` applies pending schema migrations to the PostgreSQL
//! store named by the configuration (or `REMEDY_DATABASE_URL`).
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! remedy migrate
//!
//! # Preview migrations without applying
//! remedy migrate --dry-run
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use remedy_core::domain::repository::StorageBackend;
use remedy_core::infrastructure::db::{Database, MIGRATOR};

use crate::bootstrap::load_config;

#[derive(Args)]
pub struct MigrateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: MigrateCommand, config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "Remedy Migrate".bold().green());

    let config = load_config(config_path)?;
    let postgres = match config.storage_backend()? {
        StorageBackend::PostgreSQL(postgres) => postgres,
        StorageBackend::InMemory => {
            anyhow::bail!("Storage backend is in-memory; there is no database to migrate")
        }
    };

    println!("Connecting to database...");
    let database = Database::new(&postgres)
        .await
        .context("Failed to connect to database")?;

    let applied_count = database.applied_migrations().await;
    let total_migrations = Database::available_migrations();

    println!(
        "Migration status: {} applied, {} total available.",
        applied_count, total_migrations
    );

    if applied_count >= total_migrations {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if cmd.dry_run {
        println!("Pending migrations found (Dry Run):");
        for migration in MIGRATOR.iter().skip(applied_count) {
            println!(" - {} {}", migration.version, migration.description);
        }
        println!("Skipping application due to --dry-run");
        return Ok(());
    }

    println!("Applying pending migrations...");
    let applied = database.migrate().await?;
    println!(
        "{}",
        format!("✓ Database updated successfully ({} applied).", applied).green()
    );

    Ok(())
}
