// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Suggestion review commands
//!
//! Commands: list, show, approve, reject

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use remedy_core::application::lifecycle::LifecycleService;
use remedy_core::application::review::{ListSuggestionsRequest, SuggestionListing};
use remedy_core::domain::suggestion::{
    Severity, Suggestion, SuggestionId, SuggestionStatus, SuggestionType, TransitionRecord,
};

use super::print_json;
use crate::bootstrap::{build_services, load_config, warn_if_ephemeral, Services};

#[derive(Subcommand)]
pub enum SuggestionsCommand {
    /// List suggestions, oldest first
    List {
        #[arg(long)]
        status: Option<SuggestionStatus>,

        #[arg(long = "type")]
        suggestion_type: Option<SuggestionType>,

        #[arg(long)]
        severity: Option<Severity>,

        /// Cursor returned by a previous page
        #[arg(long)]
        cursor: Option<String>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one suggestion with its traces and history
    Show {
        id: SuggestionId,
    },

    /// Approve a pending suggestion
    Approve {
        id: SuggestionId,

        /// Reviewer identity (default: $USER)
        #[arg(long, env = "REMEDY_ACTOR")]
        actor: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Reject a pending suggestion
    Reject {
        id: SuggestionId,

        #[arg(long, env = "REMEDY_ACTOR")]
        actor: Option<String>,

        /// Why the suggestion is not actionable
        #[arg(long)]
        reason: String,
    },
}

pub async fn handle_command(
    command: SuggestionsCommand,
    config_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let services = build_services(&config).await?;
    warn_if_ephemeral(&services, "suggestions");

    match command {
        SuggestionsCommand::List {
            status,
            suggestion_type,
            severity,
            cursor,
            limit,
        } => {
            let request = ListSuggestionsRequest {
                status,
                suggestion_type,
                severity,
                cursor,
                limit,
            };
            list(&services, &request, json).await
        }
        SuggestionsCommand::Show { id } => show(&services, id, json).await,
        SuggestionsCommand::Approve { id, actor, notes } => {
            let actor = resolve_actor(actor);
            let record = services.lifecycle.approve(id, &actor, notes).await?;
            print_record(&record, json)
        }
        SuggestionsCommand::Reject { id, actor, reason } => {
            let actor = resolve_actor(actor);
            let record = services.lifecycle.reject(id, &actor, &reason).await?;
            print_record(&record, json)
        }
    }
}

fn resolve_actor(actor: Option<String>) -> String {
    actor
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_default()
}

async fn list(services: &Services, request: &ListSuggestionsRequest, json: bool) -> Result<()> {
    let listing = services.review.list(request).await?;
    if json {
        return print_json(&listing);
    }
    print_listing(&listing);
    Ok(())
}

fn print_listing(listing: &SuggestionListing) {
    if listing.items.is_empty() {
        println!("{}", "No suggestions found.".dimmed());
        return;
    }

    println!(
        "{:<36}  {:<9}  {:<8}  {:<8}  {:>6}  TITLE",
        "ID", "TYPE", "STATUS", "SEVERITY", "TRACES"
    );
    for item in &listing.items {
        println!(
            "{:<36}  {:<9}  {:<8}  {:<8}  {:>6}  {}",
            item.id,
            item.suggestion_type,
            colored_status(item.status),
            item.severity,
            item.trace_count,
            item.title
        );
    }

    if let Some(cursor) = &listing.next_cursor {
        println!();
        println!("More results: --cursor {}", cursor);
    }
}

async fn show(services: &Services, id: SuggestionId, json: bool) -> Result<()> {
    let suggestion = services
        .review
        .get(id)
        .await
        .with_context(|| format!("Failed to load suggestion {}", id))?;
    if json {
        return print_json(&suggestion);
    }
    print_suggestion(&suggestion);
    Ok(())
}

fn print_suggestion(suggestion: &Suggestion) {
    let summary = suggestion.pattern_summary();
    println!("{} {}", "Suggestion".bold(), suggestion.id());
    println!("  Status: {}", colored_status(suggestion.status()));
    println!("  Type: {}", suggestion.suggestion_type());
    println!("  Severity: {}", suggestion.severity());
    println!("  Category: {:?}", summary.failure_category);
    println!("  Trigger: {}", summary.trigger_description);
    if !summary.title.is_empty() {
        println!("  Title: {}", summary.title);
    }
    println!("  Created: {}", suggestion.created_at().to_rfc3339());
    println!();

    println!("{}", "Source traces:".bold());
    for trace in suggestion.source_traces() {
        let score = trace
            .similarity_score
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "founding".to_string());
        println!("  - {} ({})", trace.trace_id, score);
    }
    println!();

    println!("{}", "History:".bold());
    for entry in suggestion.version_history() {
        let from = entry
            .previous_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        print!(
            "  {} {} -> {} by {}",
            entry.timestamp.to_rfc3339(),
            from,
            entry.new_status,
            entry.actor
        );
        match &entry.notes {
            Some(notes) => println!(": {}", notes),
            None => println!(),
        }
    }
}

fn print_record(record: &TransitionRecord, json: bool) -> Result<()> {
    if json {
        return print_json(record);
    }
    println!(
        "{}",
        format!(
            "✓ Suggestion {} {} -> {} by {}",
            record.suggestion_id, record.previous_status, record.new_status, record.actor
        )
        .green()
    );
    Ok(())
}

fn colored_status(status: SuggestionStatus) -> colored::ColoredString {
    match status {
        SuggestionStatus::Pending => status.as_str().yellow(),
        SuggestionStatus::Approved => status.as_str().green(),
        SuggestionStatus::Rejected => status.as_str().red(),
    }
}
