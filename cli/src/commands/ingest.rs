// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pattern ingestion
//!
//! Loads failure patterns exported by the extractor (a JSON array) into the
//! pattern store, optionally running a deduplication batch right after.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::warn;

use remedy_core::domain::pattern::FailurePattern;
use remedy_core::domain::repository::RepositoryError;

use super::dedup::print_summary;
use super::print_json;
use crate::bootstrap::{build_services, load_config, warn_if_ephemeral};

#[derive(Args)]
pub struct IngestCommand {
    /// JSON file holding an array of failure patterns
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Run deduplication over the ingested patterns
    #[arg(long)]
    run: bool,
}

pub async fn execute(cmd: IngestCommand, config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let patterns = read_patterns(&cmd.file)?;

    let config = load_config(config_path)?;
    let services = build_services(&config).await?;
    if !cmd.run {
        warn_if_ephemeral(&services, "ingest");
    }

    let mut inserted = 0;
    let mut duplicates = 0;
    for pattern in &patterns {
        match services.repositories.patterns.insert(pattern).await {
            Ok(()) => inserted += 1,
            Err(RepositoryError::Validation(reason)) => {
                warn!(pattern_id = %pattern.pattern_id, %reason, "Pattern not ingested");
                duplicates += 1;
            }
            Err(e) => return Err(e).context("Failed to store pattern"),
        }
    }

    if !json {
        println!(
            "{}",
            format!("✓ Ingested {} patterns ({} skipped)", inserted, duplicates).green()
        );
    }

    if cmd.run {
        let batch_size = patterns.len().max(1);
        let summary = services.orchestrator.run_deduplication(batch_size).await?;
        if json {
            return print_json(&summary);
        }
        print_summary(&summary);
    } else if json {
        return print_json(&serde_json::json!({
            "inserted": inserted,
            "skipped": duplicates,
        }));
    }

    Ok(())
}

fn read_patterns(path: &Path) -> Result<Vec<FailurePattern>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of failure patterns", path.display()))
}
