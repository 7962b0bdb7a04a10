// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Remedy CLI
//!
//! The `remedy` binary runs the deduplication pipeline and the review API.
//!
//! ## Commands
//!
//! - `remedy serve` - Review API server (plus optional Prometheus exporter)
//! - `remedy dedup run` - Process one batch of unprocessed failure patterns
//! - `remedy ingest <FILE>` - Load extractor output into the pattern store
//! - `remedy suggestions list|show|approve|reject` - Review from the terminal
//! - `remedy config show|validate|generate` - Configuration management
//! - `remedy migrate` - Apply database migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use remedy::commands::{
    self, ConfigCommand, DedupCommand, IngestCommand, MigrateCommand, ServeCommand,
    SuggestionsCommand,
};

/// Remedy - turn recurring agent failures into reviewable suggestions
#[derive(Parser)]
#[command(name = "remedy")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "REMEDY_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "REMEDY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "REMEDY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Print command results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the review API server
    #[command(name = "serve")]
    Serve {
        #[command(flatten)]
        command: ServeCommand,
    },

    /// Deduplication runs
    #[command(name = "dedup")]
    Dedup {
        #[command(subcommand)]
        command: DedupCommand,
    },

    /// Load failure patterns from a file
    #[command(name = "ingest")]
    Ingest {
        #[command(flatten)]
        command: IngestCommand,
    },

    /// Suggestion review
    #[command(name = "suggestions")]
    Suggestions {
        #[command(subcommand)]
        command: SuggestionsCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Apply database migrations
    #[command(name = "migrate")]
    Migrate {
        #[command(flatten)]
        command: MigrateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Some(Commands::Serve { command }) => commands::serve::execute(command, cli.config).await,
        Some(Commands::Dedup { command }) => {
            commands::dedup::handle_command(command, cli.config, cli.json).await
        }
        Some(Commands::Ingest { command }) => {
            commands::ingest::execute(command, cli.config, cli.json).await
        }
        Some(Commands::Suggestions { command }) => {
            commands::suggestions::handle_command(command, cli.config, cli.json).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Migrate { command }) => commands::migrate::execute(command, cli.config).await,
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
