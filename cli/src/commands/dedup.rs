// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Deduplication commands
//!
//! Commands: run

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use remedy_core::application::deduplication::RunSummary;

use super::print_json;
use crate::bootstrap::{build_services, load_config, warn_if_ephemeral};

#[derive(Subcommand)]
pub enum DedupCommand {
    /// Process one batch of unprocessed failure patterns
    Run {
        /// Patterns to process (default: spec.deduplication.batch_size)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },
}

pub async fn handle_command(
    command: DedupCommand,
    config_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    match command {
        DedupCommand::Run { batch_size } => run(config_path, batch_size, json).await,
    }
}

async fn run(config_path: Option<PathBuf>, batch_size: Option<usize>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let services = build_services(&config).await?;
    warn_if_ephemeral(&services, "dedup run");

    let batch_size = batch_size.unwrap_or(config.spec.deduplication.batch_size);
    let summary = services.orchestrator.run_deduplication(batch_size).await?;

    if json {
        print_json(&summary)
    } else {
        print_summary(&summary);
        Ok(())
    }
}

pub(crate) fn print_summary(summary: &RunSummary) {
    println!("{} {}", "Deduplication run".bold(), summary.run_id);
    println!("  Patterns processed: {}", summary.patterns_processed);
    println!(
        "  Suggestions created: {}",
        summary.suggestions_created.to_string().green()
    );
    println!(
        "  Suggestions merged: {}",
        summary.suggestions_merged.to_string().cyan()
    );
    println!("  Skipped (already recorded): {}", summary.patterns_skipped);
    match summary.average_similarity {
        Some(avg) => println!("  Average merge similarity: {:.3}", avg),
        None => println!("  Average merge similarity: {}", "n/a".dimmed()),
    }

    if summary.patterns_errored > 0 {
        println!(
            "  {}",
            format!("Errored: {}", summary.patterns_errored).yellow()
        );
        for failure in &summary.errors {
            println!(
                "    - {} (trace {}): [{}] {}",
                failure.pattern_id, failure.trace_id, failure.kind, failure.message
            );
        }
    }
}
